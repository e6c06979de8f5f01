//! Configuration infrastructure
//!
//! Contains configuration loading and management for the ingredient harvest.
//!
//! Configuration is resolved in three layers, later layers winning:
//! 1. Built-in defaults (`defaults` and `storefront` constants below)
//! 2. Optional JSON config file
//! 3. Environment variables prefixed with `INGREDIENT_HARVEST__`
//!    (double underscore separates sections, e.g.
//!    `INGREDIENT_HARVEST__HARVEST__COOLDOWN_MS=500`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub use crate::infrastructure::parsing::config::ParsingConfig;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "INGREDIENT_HARVEST";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Crawl and cache settings
    pub harvest: HarvestConfig,

    /// Markers and key paths of the embedded page payloads
    pub parsing: ParsingConfig,

    /// Relational store settings
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawl settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Search or category listing to crawl
    pub listing_url: String,

    /// Products rendered per listing page
    pub page_size: u32,

    /// Root of the on-disk page cache
    pub cache_dir: PathBuf,

    /// Pause after every live (non-cached) fetch, in milliseconds
    pub cooldown_ms: u64,

    /// Browser user agent; the storefront rejects default client identifiers
    pub user_agent: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Persist each product as soon as it is extracted
    pub persist_incrementally: bool,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:/path/to/ingredients.sqlite3`
    pub url: String,

    /// Maximum pooled connections
    pub max_connections: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `<data dir>/logs`
    pub log_dir: Option<PathBuf>,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url: storefront::DEFAULT_LISTING_URL.to_string(),
            page_size: defaults::PRODUCTS_PER_PAGE,
            cache_dir: ConfigManager::default_data_dir().join(defaults::CACHE_DIR_NAME),
            cooldown_ms: defaults::COOLDOWN_MS,
            user_agent: defaults::BROWSER_USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            persist_incrementally: defaults::PERSIST_INCREMENTALLY,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let db_path = ConfigManager::default_data_dir().join(defaults::DATABASE_FILE_NAME);
        Self {
            url: format!("sqlite:{}", db_path.display()),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Data directory, or the working directory when the platform has none
    pub fn default_data_dir() -> PathBuf {
        Self::get_app_data_dir().unwrap_or_else(|_| PathBuf::from(".").join(defaults::APP_DIR_NAME))
    }

    /// Configuration manager for the platform default config file
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Configuration manager for an explicit config file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Resolve defaults, the config file (if present) and environment overrides
    pub fn load_config(&self) -> Result<AppConfig> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let file_source = config::File::from(self.config_path.as_path())
            .format(config::FileFormat::Json)
            .required(false);

        let env_source = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);

        let config: AppConfig = config::Config::builder()
            .add_source(defaults)
            .add_source(file_source)
            .add_source(env_source)
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", self.config_path))?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if self.config_path.exists() {
            info!("Loaded configuration from: {:?}", self.config_path);
        }
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Storefront URLs, page markers and payload key paths
pub mod storefront {
    /// Default category listing crawled when no listing URL is configured
    pub const DEFAULT_LISTING_URL: &str = "https://www.sephora.com/shop/moisturizing-cream-oils-mists";

    /// Query parameter selecting the listing page (1-based)
    pub const PAGE_QUERY_PARAM: &str = "currentPage";

    /// Script block carrying the embedded JSON document
    pub const PAYLOAD_SELECTOR: &str = "script#linkStore";

    /// JSON pointer of the product object on a detail page
    pub const PRODUCT_POINTER: &str = "/page/product";

    /// Key of the single-SKU record inside the product object
    pub const SINGLE_SKU_KEY: &str = "currentSku";

    /// Key of the SKU list inside the product object
    pub const MULTI_SKU_KEY: &str = "regularChildSkus";

    /// Ingredient description (markup) field of a SKU record
    pub const INGREDIENT_FIELD: &str = "ingredientDesc";

    /// JSON pointer of the brand name, relative to the product object
    pub const BRAND_POINTER: &str = "/productDetails/brand/displayName";

    /// JSON pointer of the product array on a listing page
    pub const LISTING_PRODUCTS_POINTER: &str = "/page/nthCategory/products";

    /// Field of a listing entry holding the detail page URL
    pub const LISTING_URL_FIELD: &str = "targetUrl";

    /// Elements scanned for the "<start>-<end> of <total> Results" banner
    pub const RESULTS_COUNT_SELECTOR: &str = "p";

    /// Id of the labeled section preceding the free-text ingredient block
    pub const FREE_TEXT_SECTION_ID: &str = "Ingredients";
}

/// Default configuration values
pub mod defaults {
    /// Directory name used under the platform config/data directories
    pub const APP_DIR_NAME: &str = "ingredient-harvest";

    /// Config file name
    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Cache directory name under the data directory
    pub const CACHE_DIR_NAME: &str = "cache";

    /// Database file name under the data directory
    pub const DATABASE_FILE_NAME: &str = "ingredients.sqlite3";

    /// Products rendered per listing page (observed, fixed)
    pub const PRODUCTS_PER_PAGE: u32 = crate::domain::pagination::PRODUCTS_PER_PAGE;

    /// Pause after each live fetch in milliseconds
    pub const COOLDOWN_MS: u64 = 2000;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Realistic browser user agent
    pub const BROWSER_USER_AGENT: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0";

    /// Persist per product instead of once at the end
    pub const PERSIST_INCREMENTALLY: bool = true;

    /// Default maximum pooled database connections
    pub const DB_MAX_CONNECTIONS: u32 = 5;

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = false;
}
