//! Infrastructure layer: configuration, logging, network, cache, parsing and storage
//!
//! Everything that touches the outside world lives here; the application
//! layer composes these pieces into the harvest and query use cases.

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod ingredient_repository;
pub mod logging;
pub mod page_cache;
pub mod parsing;
pub mod parsing_error;

pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig, PageSource};
pub use ingredient_repository::{IngredientUsage, ProductSummary, SqliteIngredientRepository};
pub use logging::{get_log_directory, init_logging_with_config};
pub use page_cache::{CacheLayout, CachedFetcher};
pub use parsing::{CatalogPageParser, IngredientExtractor, ParsingConfig};
pub use parsing_error::{ExtractError, FetchError, HarvestError, ListingError, PageFormatError};
