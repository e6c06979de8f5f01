//! HTTP client for catalog crawling
//!
//! Provides the network side of the cached fetcher: a reqwest client that
//! identifies itself as a regular browser. No retries happen here; a failed
//! fetch is reported to the caller immediately.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::infrastructure::config::{HarvestConfig, defaults};
use crate::infrastructure::parsing_error::FetchError;

/// Anything that can turn a URL into page text
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP client configuration for crawling
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

impl HttpClientConfig {
    /// Create HttpClientConfig from the harvest settings
    pub fn from_harvest_config(config: &HarvestConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_seconds: config.request_timeout_seconds,
            follow_redirects: true,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::BROWSER_USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            follow_redirects: true,
        }
    }
}

/// reqwest-backed page source
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| FetchError::transport("<client>", e))?;

        Ok(Self { client, config })
    }

    pub fn from_harvest_config(config: &HarvestConfig) -> Result<Self, FetchError> {
        Self::with_config(HttpClientConfig::from_harvest_config(config))
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        info!("🌐 HTTP GET: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ HTTP error {}: {}", status, url);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::transport(url, format!("failed to read response body: {e}")))?;

        debug!("Successfully fetched: {} ({} chars)", url, text.len());
        Ok(text)
    }
}
