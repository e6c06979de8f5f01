//! Pagination rules for catalog listings.
//!
//! The listing renders a fixed number of products per page and a
//! "<start>-<end> of <total> Results" banner; the page range is derived
//! from the banner total alone.

use std::ops::RangeInclusive;

/// Observed fixed page size of the catalog listing.
pub const PRODUCTS_PER_PAGE: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCalculator {
    products_per_page: u32,
}

impl Default for PaginationCalculator {
    fn default() -> Self {
        Self {
            products_per_page: PRODUCTS_PER_PAGE,
        }
    }
}

impl PaginationCalculator {
    /// A page size of zero is treated as one product per page.
    pub fn new(products_per_page: u32) -> Self {
        Self {
            products_per_page: products_per_page.max(1),
        }
    }

    pub fn products_per_page(&self) -> u32 {
        self.products_per_page
    }

    /// `ceil(total / page_size)`
    pub fn page_count(&self, total_results: u32) -> u32 {
        total_results.div_ceil(self.products_per_page)
    }

    /// Pages to request, 1-based and inclusive. Empty when there are no results.
    pub fn page_range(&self, total_results: u32) -> RangeInclusive<u32> {
        1..=self.page_count(total_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2922, 49)]
    #[case(60, 1)]
    #[case(61, 2)]
    #[case(1, 1)]
    #[case(0, 0)]
    fn test_page_count(#[case] total: u32, #[case] pages: u32) {
        assert_eq!(PaginationCalculator::default().page_count(total), pages);
    }

    #[test]
    fn test_page_range_is_inclusive() {
        let range = PaginationCalculator::default().page_range(2922);
        assert_eq!(*range.start(), 1);
        assert_eq!(*range.end(), 49);
        assert_eq!(range.count(), 49);
    }

    #[test]
    fn test_empty_listing_has_no_pages() {
        assert_eq!(PaginationCalculator::default().page_range(0).count(), 0);
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        assert_eq!(PaginationCalculator::new(0).page_count(3), 3);
    }
}
