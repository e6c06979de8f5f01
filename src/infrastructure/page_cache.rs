//! On-disk page cache
//!
//! Every fetched page is memoized under a path derived from its listing page
//! index or product identifier. A cached file is authoritative: it is served
//! as-is, never revalidated and never overwritten.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::infrastructure::http_client::PageSource;
use crate::infrastructure::parsing_error::FetchError;

const LISTING_DIR: &str = "index";
const PRODUCT_DIR: &str = "products";
const PAGE_EXTENSION: &str = "html";

/// Deterministic cache paths under one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/index/<page>.html`
    pub fn listing_page(&self, page: u32) -> PathBuf {
        self.root
            .join(LISTING_DIR)
            .join(format!("{page}.{PAGE_EXTENSION}"))
    }

    /// `<root>/products/<encoded identifier>.html`
    pub fn product(&self, identifier: &str) -> PathBuf {
        self.root
            .join(PRODUCT_DIR)
            .join(format!("{}.{PAGE_EXTENSION}", encode_identifier(identifier)))
    }
}

/// Percent-encode everything outside the unreserved set, so path separators
/// stay inside the cache directory and distinct identifiers never share a file.
fn encode_identifier(identifier: &str) -> String {
    urlencoding::encode(identifier).into_owned()
}

/// Cache-or-fetch front of a `PageSource`
pub struct CachedFetcher<S> {
    source: S,
    cooldown: Duration,
    live_fetches: AtomicU64,
}

impl<S: PageSource> CachedFetcher<S> {
    pub fn new(source: S, cooldown: Duration) -> Self {
        Self {
            source,
            cooldown,
            live_fetches: AtomicU64::new(0),
        }
    }

    /// Return the cached content at `cache_path`, fetching and storing it on a miss.
    ///
    /// A live fetch is followed by the configured cool-down; cache hits return
    /// immediately. Non-success statuses and transport failures propagate
    /// without retry.
    pub async fn fetch_cached(&self, url: &str, cache_path: &Path) -> Result<String, FetchError> {
        match fs::read_to_string(cache_path).await {
            Ok(content) => {
                debug!("📦 Cache hit: {:?}", cache_path);
                return Ok(content);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(FetchError::cache(cache_path, e)),
        }

        let body = self.source.get_text(url).await?;
        write_cache_entry(cache_path, &body).await?;
        self.live_fetches.fetch_add(1, Ordering::Relaxed);
        info!("💾 Cached {} -> {:?}", url, cache_path);

        if !self.cooldown.is_zero() {
            tokio::time::sleep(self.cooldown).await;
        }

        Ok(body)
    }

    /// Number of network fetches performed so far
    pub fn live_fetch_count(&self) -> u64 {
        self.live_fetches.load(Ordering::Relaxed)
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Write through a temporary sibling so a crash never leaves a truncated entry.
async fn write_cache_entry(cache_path: &Path, body: &str) -> Result<(), FetchError> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| FetchError::cache(parent, e))?;
    }

    let partial = cache_path.with_extension("part");
    fs::write(&partial, body)
        .await
        .map_err(|e| FetchError::cache(&partial, e))?;
    fs::rename(&partial, cache_path)
        .await
        .map_err(|e| FetchError::cache(cache_path, e))?;
    Ok(())
}
