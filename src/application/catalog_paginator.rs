//! Catalog Paginator
//!
//! Discovers the results total of a listing, derives the page range and turns
//! each listing page into product references. Every page goes through the
//! cached fetcher, cached under `index/<page>.html`.

use tracing::{debug, info};
use url::Url;

use crate::domain::{PaginationCalculator, ProductReference};
use crate::infrastructure::config::storefront::PAGE_QUERY_PARAM;
use crate::infrastructure::http_client::PageSource;
use crate::infrastructure::page_cache::{CacheLayout, CachedFetcher};
use crate::infrastructure::parsing::CatalogPageParser;
use crate::infrastructure::parsing_error::{HarvestError, ListingError};

pub struct CatalogPaginator<'a, S> {
    fetcher: &'a CachedFetcher<S>,
    parser: &'a CatalogPageParser,
    layout: &'a CacheLayout,
    calculator: PaginationCalculator,
    listing_url: Url,
}

impl<'a, S: PageSource> CatalogPaginator<'a, S> {
    pub fn new(
        fetcher: &'a CachedFetcher<S>,
        parser: &'a CatalogPageParser,
        layout: &'a CacheLayout,
        calculator: PaginationCalculator,
        listing_url: &str,
    ) -> Result<Self, HarvestError> {
        let listing_url = Url::parse(listing_url).map_err(|e| HarvestError::InvalidListingUrl {
            url: listing_url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            fetcher,
            parser,
            layout,
            calculator,
            listing_url,
        })
    }

    /// Listing URL with the page parameter set, replacing any existing one.
    pub fn page_url(&self, page: u32) -> String {
        let mut url = self.listing_url.clone();
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != PAGE_QUERY_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(PAGE_QUERY_PARAM, &page.to_string());
        url.into()
    }

    /// Results total announced on page 1.
    pub async fn discover_total(&self) -> Result<u32, ListingError> {
        let page_url = self.page_url(1);
        let html = self
            .fetcher
            .fetch_cached(&page_url, &self.layout.listing_page(1))
            .await?;
        let total = self.parser.parse_total_results(&html, &page_url)?;

        info!(
            "📊 {} results, {} pages of {}",
            total,
            self.calculator.page_count(total),
            self.calculator.products_per_page()
        );
        Ok(total)
    }

    pub fn page_count(&self, total_results: u32) -> u32 {
        self.calculator.page_count(total_results)
    }

    pub fn page_range(&self, total_results: u32) -> std::ops::RangeInclusive<u32> {
        self.calculator.page_range(total_results)
    }

    /// Product references of one listing page, in listing order.
    pub async fn list_page(&self, page: u32) -> Result<Vec<ProductReference>, ListingError> {
        let page_url = self.page_url(page);
        let html = self
            .fetcher
            .fetch_cached(&page_url, &self.layout.listing_page(page))
            .await?;
        let references = self.parser.parse_product_references(&html, &page_url)?;
        debug!("Page {}: {} products", page, references.len());
        Ok(references)
    }
}
