//! Error module re-export
//!
//! This module re-exports the page and extraction error types.

pub use crate::infrastructure::parsing_error::{ExtractError, ExtractReason, ExtractResult, PageFormatError};
