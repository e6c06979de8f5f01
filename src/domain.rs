//! Domain module - Core types and rules of the ingredient harvest
//!
//! This module contains the entities and value objects shared by the
//! crawler, the extractor and the conflict lookup, plus the repository
//! interfaces the infrastructure layer implements.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod conflict;
pub mod harvest;
pub mod pagination;
pub mod product;
pub mod repositories;

// Re-export commonly used items for convenience
pub use conflict::{ConflictDefinition, ConflictPair, Severity};
pub use harvest::{FailureKind, FailureRecord, FailureTarget, HarvestReport};
pub use pagination::PaginationCalculator;
pub use product::{IngredientSet, ProductIngredientMap, ProductReference};
pub use repositories::IngredientStore;
