//! Handlers that drive the sync engine

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use storesync_domain::{EntityType, Job, JobName, Result, StorePayload};

use crate::jobs::ports::JobHandler;
use crate::jobs::schedule::RecurringCatalog;
use crate::sync::{SyncEngine, WebhookReconciler};

/// `woo-sync-orders` / `woo-sync-products`
pub struct StoreSyncHandler {
    engine: Arc<SyncEngine>,
    entity: EntityType,
}

impl StoreSyncHandler {
    pub fn orders(engine: Arc<SyncEngine>) -> Self {
        Self { engine, entity: EntityType::Orders }
    }

    pub fn products(engine: Arc<SyncEngine>) -> Self {
        Self { engine, entity: EntityType::Products }
    }
}

#[async_trait]
impl JobHandler for StoreSyncHandler {
    fn name(&self) -> JobName {
        match self.entity {
            EntityType::Orders => JobName::WooSyncOrders,
            EntityType::Products => JobName::WooSyncProducts,
        }
    }

    async fn handle(&self, job: &Job) -> Result<Value> {
        let payload: StorePayload = job.payload()?;
        let started = Instant::now();
        let report = self.engine.pull(&payload.store_id, self.entity).await?;

        Ok(json!({
            "success": true,
            "storeId": report.store_id,
            "entity": self.entity.as_str(),
            "pages": report.pages,
            "imported": report.imported,
            "skipped": report.skipped,
            "cursorAdvanced": report.advanced_to.is_some(),
            "durationMs": started.elapsed().as_millis() as u64,
        }))
    }
}

/// `process-webhook-events`
pub struct WebhookEventsHandler {
    reconciler: Arc<WebhookReconciler>,
}

impl WebhookEventsHandler {
    pub fn new(reconciler: Arc<WebhookReconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl JobHandler for WebhookEventsHandler {
    fn name(&self) -> JobName {
        JobName::ProcessWebhookEvents
    }

    async fn handle(&self, _job: &Job) -> Result<Value> {
        let report = self.reconciler.process_batch().await?;
        Ok(json!({
            "success": true,
            "fetched": report.fetched,
            "processed": report.processed,
            "failed": report.failed,
            "ignored": report.ignored,
        }))
    }
}

/// `woo-schedule`: (re)register per-store sync schedules
pub struct WooScheduleHandler {
    catalog: Arc<RecurringCatalog>,
}

impl WooScheduleHandler {
    pub fn new(catalog: Arc<RecurringCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl JobHandler for WooScheduleHandler {
    fn name(&self) -> JobName {
        JobName::WooSchedule
    }

    async fn handle(&self, _job: &Job) -> Result<Value> {
        let report = self.catalog.register_store_schedules().await?;
        Ok(json!({
            "success": true,
            "stores": report.stores,
            "registered": report.registered,
            "removed": report.removed,
        }))
    }
}
