//! Harvest run outcome: extracted ingredients plus isolated failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::product::{IngredientSet, ProductIngredientMap, ProductReference};

/// What a failure record is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureTarget {
    ListingPage { page: u32, url: String },
    Product(ProductReference),
}

impl FailureTarget {
    pub fn product_identifier(&self) -> Option<&str> {
        match self {
            Self::Product(reference) => Some(&reference.identifier),
            Self::ListingPage { .. } => None,
        }
    }
}

impl fmt::Display for FailureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListingPage { page, url } => write!(f, "listing page {page} ({url})"),
            Self::Product(reference) => write!(f, "product {reference}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    PageFormat,
    Extract,
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fetch => "fetch",
            Self::PageFormat => "page-format",
            Self::Extract => "extract",
            Self::Storage => "storage",
        };
        f.write_str(label)
    }
}

/// A page or product that could not be processed. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub target: FailureTarget,
    pub kind: FailureKind,
    pub reason: String,
}

impl FailureRecord {
    pub fn product(reference: ProductReference, kind: FailureKind, reason: impl fmt::Display) -> Self {
        Self {
            target: FailureTarget::Product(reference),
            kind,
            reason: reason.to_string(),
        }
    }

    pub fn listing_page(page: u32, url: impl Into<String>, kind: FailureKind, reason: impl fmt::Display) -> Self {
        Self {
            target: FailureTarget::ListingPage { page, url: url.into() },
            kind,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.target, self.reason)
    }
}

/// Everything a harvest run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_results: u32,
    pub pages_visited: Vec<u32>,
    pub products: ProductIngredientMap,
    /// Brand display names, when the page exposes one.
    pub brands: BTreeMap<String, String>,
    pub failures: Vec<FailureRecord>,
    /// Set when the run was cancelled before visiting every product.
    pub interrupted: bool,
}

impl HarvestReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            total_results: 0,
            pages_visited: Vec::new(),
            products: ProductIngredientMap::new(),
            brands: BTreeMap::new(),
            failures: Vec::new(),
            interrupted: false,
        }
    }

    pub fn record_success(&mut self, identifier: &str, ingredients: IngredientSet) {
        self.products.insert(identifier.to_string(), ingredients);
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn distinct_ingredient_count(&self) -> usize {
        self.products
            .values()
            .flat_map(IngredientSet::iter)
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }
}
