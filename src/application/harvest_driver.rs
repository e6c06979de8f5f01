//! Harvest Driver
//!
//! Walks every listing page, then every discovered product, accumulating
//! ingredient sets. Only the results total on the first listing page is
//! load-bearing: without it there is nothing to crawl, so failing to read it
//! aborts the run. Every listing page and every product fails in isolation and
//! is recorded in the report.

use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::catalog_paginator::CatalogPaginator;
use crate::domain::{
    FailureKind, FailureRecord, HarvestReport, IngredientStore, PaginationCalculator, ProductReference,
};
use crate::infrastructure::config::HarvestConfig;
use crate::infrastructure::http_client::PageSource;
use crate::infrastructure::page_cache::{CacheLayout, CachedFetcher};
use crate::infrastructure::parsing::{CatalogPageParser, ExtractedProduct, IngredientExtractor, ParsingConfig};
use crate::infrastructure::parsing_error::{HarvestError, ListingError};

pub struct HarvestDriver<S> {
    fetcher: CachedFetcher<S>,
    catalog_parser: CatalogPageParser,
    extractor: IngredientExtractor,
    layout: CacheLayout,
    calculator: PaginationCalculator,
    cancel: CancellationToken,
}

impl<S: PageSource> HarvestDriver<S> {
    pub fn new(source: S, harvest: &HarvestConfig, parsing: &ParsingConfig) -> Result<Self> {
        Ok(Self {
            fetcher: CachedFetcher::new(source, Duration::from_millis(harvest.cooldown_ms)),
            catalog_parser: CatalogPageParser::with_config(parsing)?,
            extractor: IngredientExtractor::with_config(parsing)?,
            layout: CacheLayout::new(&harvest.cache_dir),
            calculator: PaginationCalculator::new(harvest.page_size),
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned token, e.g. one cancelled by Ctrl-C.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn fetcher(&self) -> &CachedFetcher<S> {
        &self.fetcher
    }

    /// Crawl the listing and return every extracted product plus the failures.
    pub async fn harvest(&self, listing_url: &str) -> Result<HarvestReport, HarvestError> {
        self.run(listing_url, None).await
    }

    /// Like `harvest`, but persist each product as soon as it is extracted.
    pub async fn harvest_into(
        &self,
        listing_url: &str,
        store: &dyn IngredientStore,
    ) -> Result<HarvestReport, HarvestError> {
        self.run(listing_url, Some(store)).await
    }

    async fn run(
        &self,
        listing_url: &str,
        store: Option<&dyn IngredientStore>,
    ) -> Result<HarvestReport, HarvestError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("harvest", run_id = %run_id);
        self.run_in_span(run_id, listing_url, store).instrument(span).await
    }

    async fn run_in_span(
        &self,
        run_id: Uuid,
        listing_url: &str,
        store: Option<&dyn IngredientStore>,
    ) -> Result<HarvestReport, HarvestError> {
        info!("🚀 Starting harvest of {}", listing_url);
        let mut report = HarvestReport::new(run_id);

        let paginator = CatalogPaginator::new(
            &self.fetcher,
            &self.catalog_parser,
            &self.layout,
            self.calculator,
            listing_url,
        )?;

        let total = paginator.discover_total().await.map_err(|e| {
            error!("❌ Cannot determine the results total: {}", e);
            HarvestError::from(e)
        })?;
        report.total_results = total;

        let references = self.collect_references(&paginator, total, &mut report).await;

        let product_count = references.len();
        for (index, reference) in references.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            info!("🔍 [{}/{}] {}", index + 1, product_count, reference.identifier);
            self.harvest_product(reference, store, &mut report).await;
        }

        report.finish();
        if report.interrupted {
            warn!("⏹️ Harvest interrupted, returning partial results");
        }
        info!(
            "✅ Harvest finished: {} products, {} distinct ingredients, {} failures",
            report.products.len(),
            report.distinct_ingredient_count(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Visit every listing page once, deduplicating references across pages.
    ///
    /// Page 1 was already read by `discover_total`, so a listing failure here
    /// is recorded like any other page.
    async fn collect_references(
        &self,
        paginator: &CatalogPaginator<'_, S>,
        total: u32,
        report: &mut HarvestReport,
    ) -> Vec<ProductReference> {
        let mut seen = HashSet::new();
        let mut references = Vec::new();

        for page in paginator.page_range(total) {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            report.pages_visited.push(page);
            match paginator.list_page(page).await {
                Ok(page_references) => {
                    info!("📄 Page {}/{}: {} products", page, paginator.page_count(total), page_references.len());
                    references.extend(
                        page_references
                            .into_iter()
                            .filter(|reference| seen.insert(reference.identifier.clone())),
                    );
                }
                Err(e) => {
                    warn!("⚠️ Skipping listing page {}: {}", page, e);
                    let kind = match e {
                        ListingError::Fetch(_) => FailureKind::Fetch,
                        ListingError::PageFormat(_) => FailureKind::PageFormat,
                    };
                    report.record_failure(FailureRecord::listing_page(page, paginator.page_url(page), kind, e));
                }
            }
        }

        references
    }

    async fn harvest_product(
        &self,
        reference: ProductReference,
        store: Option<&dyn IngredientStore>,
        report: &mut HarvestReport,
    ) {
        let cache_path = self.layout.product(&reference.identifier);
        let html = match self.fetcher.fetch_cached(&reference.url, &cache_path).await {
            Ok(html) => html,
            Err(e) => {
                warn!("⚠️ Fetch failed for {}: {}", reference.identifier, e);
                report.record_failure(FailureRecord::product(reference, FailureKind::Fetch, e));
                return;
            }
        };

        let product = match self.extractor.extract_product(&html) {
            Ok(product) => product,
            Err(e) => {
                warn!("⚠️ Extraction failed for {}: {}", reference.identifier, e);
                report.record_failure(FailureRecord::product(reference, FailureKind::Extract, e));
                return;
            }
        };

        if let Some(store) = store {
            if let Err(e) = persist_product(store, &reference.identifier, &product).await {
                warn!("⚠️ Could not store {}: {:#}", reference.identifier, e);
                report.record_failure(FailureRecord::product(reference, FailureKind::Storage, format!("{e:#}")));
                return;
            }
        }

        if let Some(brand) = product.brand {
            report.brands.insert(reference.identifier.clone(), brand);
        }
        report.record_success(&reference.identifier, product.ingredients);
    }
}

async fn persist_product(store: &dyn IngredientStore, identifier: &str, product: &ExtractedProduct) -> Result<()> {
    store.persist_product(identifier, &product.ingredients).await?;
    if let Some(brand) = &product.brand {
        store.set_brand(identifier, brand).await?;
    }
    Ok(())
}

/// Wholesale hand-off of a finished report: products, links, then brands.
pub async fn persist_report(store: &dyn IngredientStore, report: &HarvestReport) -> Result<(), HarvestError> {
    store.persist_all(&report.products).await.map_err(HarvestError::Storage)?;
    for (identifier, brand) in &report.brands {
        store.set_brand(identifier, brand).await.map_err(HarvestError::Storage)?;
    }
    Ok(())
}
