//! HTML and embedded-JSON parsing for catalog and product pages
//!
//! Listing pages yield the results count and product references, detail pages
//! yield a canonical ingredient set. Parsers are built once from a
//! `ParsingConfig` and reused for every page of a run.

pub mod catalog_page_parser;
pub mod config;
pub mod embedded_payload;
pub mod error;
pub mod ingredient_extractor;

pub use catalog_page_parser::CatalogPageParser;
pub use config::ParsingConfig;
pub use embedded_payload::EmbeddedPayload;
pub use error::{ExtractError, ExtractReason, ExtractResult, PageFormatError};
pub use ingredient_extractor::{ExtractedProduct, IngredientExtractor, RawProductPayload};

use anyhow::{Result, anyhow};
use regex::Regex;
use scraper::Selector;

/// Compile a CSS selector from configuration
pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Failed to compile selector '{}': {}", selector, e))
}

/// Compile a regex pattern, naming it in the error
pub(crate) fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow!("Failed to compile {} pattern '{}': {}", name, pattern, e))
}
