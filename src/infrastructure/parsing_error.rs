//! Error taxonomy of the harvest pipeline
//!
//! - `FetchError`: transport failure or non-success status, fatal to one fetch
//! - `PageFormatError`: a marker, pattern or key path is missing on a listing page
//! - `ExtractError`: same, on a product detail page; isolated per product
//! - `HarvestError`: what aborts a whole run

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP request failed with status {status}: {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to fetch {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Cache I/O failed for {path:?}: {message}")]
    Cache { path: PathBuf, message: String },
}

impl FetchError {
    pub fn transport(url: &str, error: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }

    pub fn cache(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::Cache {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageFormatError {
    #[error("No '<start>-<end> of <total> Results' banner found on {url}")]
    MissingResultsCount { url: String },

    #[error("Embedded payload '{marker}' not found on {url}")]
    MissingPayload { url: String, marker: String },

    #[error("Embedded payload on {url} is not valid JSON: {message}")]
    InvalidPayload { url: String, message: String },

    #[error("Key path '{path}' missing from payload on {url}")]
    MissingPath { url: String, path: String },

    #[error("Listing entry {index} on {url} has no usable product URL")]
    InvalidReference { url: String, index: usize },
}

/// Why a product page yielded no ingredient set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractReason {
    #[error("missing payload")]
    MissingPayload,

    #[error("unknown shape")]
    UnknownShape,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Ingredient extraction failed: {reason}")]
pub struct ExtractError {
    pub reason: ExtractReason,
}

impl From<ExtractReason> for ExtractError {
    fn from(reason: ExtractReason) -> Self {
        Self { reason }
    }
}

/// Errors that stop a harvest run
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    PageFormat(#[from] PageFormatError),

    #[error("Invalid listing URL {url}: {message}")]
    InvalidListingUrl { url: String, message: String },

    #[error("Storage failed: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Failure of a single listing page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    PageFormat(#[from] PageFormatError),
}

impl From<ListingError> for HarvestError {
    fn from(error: ListingError) -> Self {
        match error {
            ListingError::Fetch(e) => Self::Fetch(e),
            ListingError::PageFormat(e) => Self::PageFormat(e),
        }
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;
