//! Ingredient Harvest - cosmetic ingredient crawler and conflict lookup
//!
//! Crawls a storefront catalog through an on-disk page cache, normalizes each
//! product's ingredient list into a canonical set, stores the result in SQLite
//! and answers "which flagged ingredient pairs meet in this product selection".

pub mod application;
pub mod domain;
pub mod infrastructure;
