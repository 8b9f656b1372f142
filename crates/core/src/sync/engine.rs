//! Cursor-based incremental pull
//!
//! One sweep pages the upstream list endpoint from the stored cursor, upserts
//! every record and advances the cursor to the sweep start time only after
//! the last page has been consumed. Any error aborts the sweep and leaves the
//! cursor where it was.
//!
//! A store without a cursor gets its first window start written before any
//! page is fetched, so a retried first sweep asks for the same window. A sweep
//! cut short by the page cap keeps the cursor where it was.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use storesync_common::Clock;
use storesync_domain::{EntityType, Result, StoreSyncError, SyncConfig, WooStore};
use tracing::{debug, info, instrument, warn};

use super::mapping::{map_order, map_product};
use super::ports::{
    OrderRepository, PageRequest, ProductRepository, StoreRepository, UpstreamCatalog,
};
use crate::clock::utc_now;
use crate::metrics_ports::WorkerMetricsPort;

/// Paging parameters for pull sweeps and webhook batches
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay: Duration,
    pub lookback: chrono::Duration,
    pub webhook_batch_size: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            page_delay: config.page_delay(),
            lookback: config.lookback(),
            webhook_batch_size: config.webhook_batch_size,
        }
    }
}

/// Outcome of one completed sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub store_id: String,
    pub entity: EntityType,
    /// Upstream pages requested, including the terminating empty page
    pub pages: u32,
    pub imported: u32,
    /// Records that could not be mapped and were left out
    pub skipped: u32,
    pub since: DateTime<Utc>,
    /// Cursor value written by this sweep, if it moved
    pub advanced_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SweepCounts {
    pages: u32,
    imported: u32,
    skipped: u32,
    /// Last page was non-empty when the page cap stopped the sweep
    truncated: bool,
}

/// Runs pull sweeps for one store and entity at a time
pub struct SyncEngine {
    stores: Arc<dyn StoreRepository>,
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    upstream: Arc<dyn UpstreamCatalog>,
    metrics: Arc<dyn WorkerMetricsPort>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        upstream: Arc<dyn UpstreamCatalog>,
        metrics: Arc<dyn WorkerMetricsPort>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self { stores, orders, products, upstream, metrics, clock, settings }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one full sweep for `store_id` and `entity`.
    ///
    /// # Errors
    /// `NotFound` when the store does not exist; otherwise the first storage
    /// or upstream error, in which case the cursor is untouched.
    #[instrument(skip(self), fields(entity = %entity))]
    pub async fn pull(&self, store_id: &str, entity: EntityType) -> Result<PullReport> {
        let started = Instant::now();
        let store = self
            .stores
            .find_store(store_id)
            .await?
            .ok_or_else(|| StoreSyncError::NotFound(format!("store {store_id}")))?;

        let sweep_started = utc_now(self.clock.as_ref());
        let since = store.last_sync.since(entity, sweep_started, self.settings.lookback);
        if store.last_sync.get(entity).is_none() {
            self.stores.advance_cursor(store_id, entity, since).await?;
            debug!(store_id, since = %since, "Pinned initial sync window");
        }

        let outcome = self.sweep(&store, entity, since, sweep_started).await;
        let SweepCounts { pages, imported, skipped, truncated } = match outcome {
            Ok(counts) => counts,
            Err(err) => {
                let lag = (sweep_started - since).num_milliseconds().max(0) as f64 / 1000.0;
                self.metrics.set_sync_lag(store_id, entity, lag);
                warn!(store_id, error = %err, since = %since, "Sweep aborted, cursor unchanged");
                return Err(err);
            }
        };

        let advanced_to = if truncated {
            warn!(store_id, since = %since, "Page cap cut the sweep short, cursor unchanged");
            None
        } else if imported > 0 {
            self.stores
                .advance_cursor(store_id, entity, sweep_started)
                .await?
                .then_some(sweep_started)
        } else {
            None
        };
        self.metrics.set_sync_lag(store_id, entity, 0.0);

        info!(
            store_id,
            pages,
            imported,
            skipped,
            cursor_advanced = advanced_to.is_some(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Sweep completed"
        );

        Ok(PullReport {
            store_id: store_id.to_string(),
            entity,
            pages,
            imported,
            skipped,
            since,
            advanced_to,
        })
    }

    async fn sweep(
        &self,
        store: &WooStore,
        entity: EntityType,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<SweepCounts> {
        let mut counts = SweepCounts::default();

        for page in 1..=self.settings.max_pages {
            let request = PageRequest {
                entity,
                page,
                per_page: self.settings.page_size,
                modified_after: since,
            };
            let records = self.upstream.fetch_page(store, &request).await?;
            counts.pages += 1;

            if records.is_empty() {
                debug!(store_id = %store.id, page, "Empty page, sweep finished");
                break;
            }

            for raw in &records {
                match self.upsert(store, entity, raw, now).await {
                    Ok(()) => counts.imported += 1,
                    Err(StoreSyncError::InvalidPayload(reason)) => {
                        counts.skipped += 1;
                        warn!(store_id = %store.id, page, %reason, "Skipping unmappable record");
                    }
                    Err(err) => return Err(err),
                }
            }

            if page == self.settings.max_pages {
                warn!(store_id = %store.id, max_pages = page, "Page cap reached");
                counts.truncated = true;
            } else if !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        Ok(counts)
    }

    async fn upsert(
        &self,
        store: &WooStore,
        entity: EntityType,
        raw: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match entity {
            EntityType::Orders => {
                let order = map_order(&store.tenant_id, raw, now)?;
                self.orders.upsert_order(&order).await?;
            }
            EntityType::Products => {
                let product = map_product(&store.tenant_id, raw)?;
                self.products.upsert_product(&product).await?;
            }
        }
        Ok(())
    }
}
