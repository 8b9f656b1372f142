#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use storesync_domain::{
    OrderItemDraft, OrderUpsert, ProductUpsert, SyncCursor, WebhookEvent, WebhookStatus, WooStore,
};
use storesync_infra::database::DbManager;
use tempfile::TempDir;

/// Temporary database with migrations applied; the file lives as long as
/// the value.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("storesync-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row(sql, [], |row| row.get(0)).expect("count query should succeed")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn store(id: &str, tenant_id: &str, base_url: &str) -> WooStore {
    WooStore {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        name: Some(format!("Store {id}")),
        base_url: base_url.to_string(),
        api_version: "v3".to_string(),
        consumer_key: "ck_test".to_string(),
        consumer_secret: "cs_test".to_string(),
        active: true,
        last_sync: SyncCursor::default(),
    }
}

pub fn item(sku: &str, qty: i64, price: &str) -> OrderItemDraft {
    OrderItemDraft {
        sku: Some(sku.to_string()),
        name: Some(format!("Item {sku}")),
        qty,
        price: Some(price.to_string()),
    }
}

pub fn order(tenant_id: &str, number: &str, total: &str, items: Option<Vec<OrderItemDraft>>) -> OrderUpsert {
    OrderUpsert {
        tenant_id: tenant_id.to_string(),
        external_order_no: number.to_string(),
        order_source: "woo".to_string(),
        status: "processing".to_string(),
        mapped_status: "processing".to_string(),
        total: Some(total.to_string()),
        currency: "TRY".to_string(),
        customer_email: Some("buyer@example.com".to_string()),
        customer_phone: None,
        shipping_address: Some(json!({ "city": "Izmir" })),
        billing_address: None,
        payment_method: Some("cod".to_string()),
        confirmed_at: at(9, 0),
        items,
    }
}

pub fn product(tenant_id: &str, sku: &str, stock: Option<i64>) -> ProductUpsert {
    ProductUpsert {
        tenant_id: tenant_id.to_string(),
        sku: sku.to_string(),
        name: Some(format!("Product {sku}")),
        price: Some("19.90".to_string()),
        stock,
        images: vec!["https://cdn.example.com/a.png".to_string()],
        tags: vec!["summer".to_string()],
        active: true,
    }
}

pub fn webhook_event(id: &str, topic: &str, payload: &str, created_at: DateTime<Utc>) -> WebhookEvent {
    WebhookEvent {
        id: id.to_string(),
        provider: "woocommerce".to_string(),
        topic: topic.to_string(),
        store_id: Some("store-1".to_string()),
        payload: payload.to_string(),
        status: WebhookStatus::Received,
        attempts: 0,
        created_at,
        processed_at: None,
        error: None,
    }
}
