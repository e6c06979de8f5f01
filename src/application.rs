//! Application layer: the harvest and query use cases
//!
//! Composes the infrastructure pieces (cached fetcher, parsers, SQLite
//! repositories) into the operations the CLI exposes.

pub mod catalog_paginator;
pub mod conflict_query;
pub mod harvest_driver;

pub use catalog_paginator::CatalogPaginator;
pub use conflict_query::{ConflictQueryEngine, read_definitions};
pub use harvest_driver::{HarvestDriver, persist_report};
