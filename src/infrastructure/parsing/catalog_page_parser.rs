//! Listing page parser
//!
//! Reads the results-count banner (`1-60 of 2,922 Results`) and the product
//! array of the embedded JSON document.

use anyhow::Result;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use super::config::ParsingConfig;
use super::embedded_payload::EmbeddedPayload;
use super::error::PageFormatError;
use super::{compile_pattern, compile_selector};
use crate::domain::ProductReference;

const RESULTS_COUNT_PATTERN: &str = r"(\d[\d,]*)\s*-\s*(\d[\d,]*)\s+of\s+(\d[\d,]*)\s+Results";

pub struct CatalogPageParser {
    results_selector: Selector,
    results_pattern: Regex,
    payload: EmbeddedPayload,
    products_pointer: String,
    url_field: String,
}

impl CatalogPageParser {
    pub fn new() -> Result<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> Result<Self> {
        Ok(Self {
            results_selector: compile_selector(&config.results_count_selector)?,
            results_pattern: compile_pattern("results count", RESULTS_COUNT_PATTERN)?,
            payload: EmbeddedPayload::new(&config.payload_selector)?,
            products_pointer: config.listing_products_pointer.clone(),
            url_field: config.listing_url_field.clone(),
        })
    }

    /// Total number of results announced by the listing page.
    pub fn parse_total_results(&self, html: &str, page_url: &str) -> Result<u32, PageFormatError> {
        let document = Html::parse_document(html);

        for element in document.select(&self.results_selector) {
            let text = element.text().collect::<String>();
            let Some(captures) = self.results_pattern.captures(&text) else {
                continue;
            };
            match captures[3].replace(',', "").parse::<u32>() {
                Ok(total) => {
                    debug!("Results banner on {}: {:?} -> {}", page_url, text.trim(), total);
                    return Ok(total);
                }
                Err(e) => warn!("Unreadable results total {:?} on {}: {}", &captures[3], page_url, e),
            }
        }

        Err(PageFormatError::MissingResultsCount {
            url: page_url.to_string(),
        })
    }

    /// Product references in listing order, first occurrence of each identifier kept.
    pub fn parse_product_references(
        &self,
        html: &str,
        page_url: &str,
    ) -> Result<Vec<ProductReference>, PageFormatError> {
        let base = Url::parse(page_url).map_err(|e| PageFormatError::InvalidPayload {
            url: page_url.to_string(),
            message: format!("page URL is not absolute: {e}"),
        })?;

        let document = Html::parse_document(html);
        let value = self
            .payload
            .read(&document)
            .map_err(|e| PageFormatError::InvalidPayload {
                url: page_url.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| PageFormatError::MissingPayload {
                url: page_url.to_string(),
                marker: self.payload.marker().to_string(),
            })?;

        let entries = value
            .pointer(&self.products_pointer)
            .and_then(|products| products.as_array())
            .ok_or_else(|| PageFormatError::MissingPath {
                url: page_url.to_string(),
                path: self.products_pointer.clone(),
            })?;

        let mut seen = HashSet::new();
        let mut references = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let reference = entry
                .get(&self.url_field)
                .and_then(|target| target.as_str())
                .and_then(|target| reference_from_target(&base, target))
                .ok_or_else(|| PageFormatError::InvalidReference {
                    url: page_url.to_string(),
                    index,
                })?;

            if seen.insert(reference.identifier.clone()) {
                references.push(reference);
            }
        }

        debug!("Found {} product references on {}", references.len(), page_url);
        Ok(references)
    }
}

/// Resolve a listing entry's target URL into a reference.
///
/// The identifier is the last non-empty path segment; the canonical URL is the
/// resolved URL without query and fragment.
pub fn reference_from_target(base: &Url, target: &str) -> Option<ProductReference> {
    let mut resolved = base.join(target).ok()?;
    let identifier = resolved
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?
        .to_string();

    resolved.set_query(None);
    resolved.set_fragment(None);
    Some(ProductReference::new(identifier, resolved))
}
