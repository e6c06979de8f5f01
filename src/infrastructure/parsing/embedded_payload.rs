//! Embedded JSON document of a storefront page
//!
//! Both listing and detail pages carry one script block, identified by a
//! selector such as `script#linkStore`, whose text is the page's JSON state.

use anyhow::Result;
use scraper::{Html, Selector};
use serde_json::Value;

use super::compile_selector;

#[derive(Debug, Clone)]
pub struct EmbeddedPayload {
    selector: Selector,
    marker: String,
}

impl EmbeddedPayload {
    pub fn new(marker: &str) -> Result<Self> {
        Ok(Self {
            selector: compile_selector(marker)?,
            marker: marker.to_string(),
        })
    }

    /// Selector text, used when reporting a missing block
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Raw text of the first matching block, if any.
    pub fn locate(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selector)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
    }

    /// Parse the block as JSON. `Ok(None)` means the page has no such block.
    pub fn read(&self, document: &Html) -> Result<Option<Value>, serde_json::Error> {
        match self.locate(document) {
            Some(text) => serde_json::from_str(&text).map(Some),
            None => Ok(None),
        }
    }
}
