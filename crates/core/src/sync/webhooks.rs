//! Webhook event reconciliation
//!
//! Drains `received` events oldest first and routes each to the same upsert
//! path the pull sweep uses. Every event ends `processed` or `failed`; one bad
//! event never stops the batch.

use std::sync::Arc;

use serde_json::Value;
use storesync_common::Clock;
use storesync_domain::constants::{MAX_ERROR_LENGTH, WEBHOOK_PROVIDER};
use storesync_domain::{Result, StoreSyncError, WebhookEvent, WebhookTopic};
use tracing::{debug, error, info, instrument, warn};

use super::mapping::{map_order, map_product};
use super::ports::{OrderRepository, ProductRepository, StoreRepository, WebhookEventRepository};
use crate::clock::utc_now;

/// Counts for one reconciliation batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub fetched: usize,
    pub processed: usize,
    pub failed: usize,
    /// Processed events whose topic has no local handler
    pub ignored: usize,
}

pub struct WebhookReconciler {
    events: Arc<dyn WebhookEventRepository>,
    stores: Arc<dyn StoreRepository>,
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    clock: Arc<dyn Clock>,
    batch_size: u32,
}

enum Applied {
    Upserted,
    Ignored,
}

impl WebhookReconciler {
    pub fn new(
        events: Arc<dyn WebhookEventRepository>,
        stores: Arc<dyn StoreRepository>,
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        clock: Arc<dyn Clock>,
        batch_size: u32,
    ) -> Self {
        Self { events, stores, orders, products, clock, batch_size }
    }

    /// Reconcile one batch of received events.
    ///
    /// # Errors
    /// Only when the batch itself cannot be fetched. Per-event failures are
    /// recorded on the event.
    #[instrument(skip(self))]
    pub async fn process_batch(&self) -> Result<ReconcileReport> {
        let batch = self.events.fetch_received(WEBHOOK_PROVIDER, self.batch_size).await?;
        let mut report = ReconcileReport { fetched: batch.len(), ..ReconcileReport::default() };

        for event in &batch {
            match self.apply(event).await {
                Ok(applied) => {
                    if let Err(err) = self.events.mark_processed(&event.id, utc_now(self.clock.as_ref())).await {
                        error!(event_id = %event.id, error = %err, "Failed to mark webhook event processed");
                        continue;
                    }
                    report.processed += 1;
                    if matches!(applied, Applied::Ignored) {
                        report.ignored += 1;
                    }
                }
                Err(err) => {
                    warn!(event_id = %event.id, topic = %event.topic, error = %err, "Webhook event failed");
                    let message = truncate(&err.to_string(), MAX_ERROR_LENGTH);
                    if let Err(mark_err) = self.events.mark_failed(&event.id, &message).await {
                        error!(event_id = %event.id, error = %mark_err, "Failed to mark webhook event failed");
                        continue;
                    }
                    report.failed += 1;
                }
            }
        }

        if report.fetched > 0 {
            info!(
                fetched = report.fetched,
                processed = report.processed,
                failed = report.failed,
                "Webhook batch reconciled"
            );
        }
        Ok(report)
    }

    async fn apply(&self, event: &WebhookEvent) -> Result<Applied> {
        let topic = event.topic_kind();
        if topic == WebhookTopic::Other {
            debug!(event_id = %event.id, topic = %event.topic, "No handler for topic");
            return Ok(Applied::Ignored);
        }

        let store_id = event
            .store_id
            .as_deref()
            .ok_or_else(|| StoreSyncError::NotFound("webhook event has no store reference".into()))?;
        let store = self
            .stores
            .find_store(store_id)
            .await?
            .ok_or_else(|| StoreSyncError::NotFound(format!("store {store_id}")))?;

        let payload: Value = serde_json::from_str(&event.payload)?;

        match topic {
            WebhookTopic::Order => {
                let order = map_order(&store.tenant_id, &payload, utc_now(self.clock.as_ref()))?;
                self.orders.upsert_order(&order).await?;
            }
            WebhookTopic::Product => {
                let product = map_product(&store.tenant_id, &payload)?;
                self.products.upsert_product(&product).await?;
            }
            WebhookTopic::Other => return Ok(Applied::Ignored),
        }
        Ok(Applied::Upserted)
    }
}

fn truncate(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
