//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use storesync_domain::{
    EntityType, Order, OrderUpsert, Product, ProductUpsert, Result, UpsertOutcome, WebhookEvent,
    WooStore,
};

/// Connected store records and their cursors
#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn find_store(&self, store_id: &str) -> Result<Option<WooStore>>;

    async fn list_active_stores(&self) -> Result<Vec<WooStore>>;

    /// Persist `to` as the entity's cursor only if it moves the cursor
    /// forward. Returns whether a write happened.
    async fn advance_cursor(
        &self,
        store_id: &str,
        entity: EntityType,
        to: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Orders keyed by (tenant, external order number)
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or update the order; when `items` is present, replace the
    /// line-item set in the same transaction.
    async fn upsert_order(&self, order: &OrderUpsert) -> Result<UpsertOutcome>;

    async fn find_order(&self, tenant_id: &str, external_order_no: &str) -> Result<Option<Order>>;

    async fn set_order_note(&self, order_id: &str, note: &str) -> Result<()>;
}

/// Products keyed by (tenant, sku)
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn upsert_product(&self, product: &ProductUpsert) -> Result<UpsertOutcome>;

    async fn find_product(&self, tenant_id: &str, sku: &str) -> Result<Option<Product>>;
}

/// Webhook events written by the receiver
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Oldest-first events with status `received` for `provider`
    async fn fetch_received(&self, provider: &str, limit: u32) -> Result<Vec<WebhookEvent>>;

    /// `received -> processed`, incrementing attempts
    async fn mark_processed(&self, id: &str, processed_at: DateTime<Utc>) -> Result<()>;

    /// `received -> failed`, incrementing attempts
    async fn mark_failed(&self, id: &str, error: &str) -> Result<()>;
}

/// One page of an upstream list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub entity: EntityType,
    /// 1-based
    pub page: u32,
    pub per_page: u32,
    pub modified_after: DateTime<Utc>,
}

/// Upstream list endpoint
#[async_trait]
pub trait UpstreamCatalog: Send + Sync {
    /// Fetch one page ordered by modification time ascending.
    ///
    /// Any non-2xx response is an error; an empty vector means no more pages.
    async fn fetch_page(&self, store: &WooStore, request: &PageRequest) -> Result<Vec<Value>>;
}
