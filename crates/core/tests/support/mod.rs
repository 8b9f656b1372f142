//! Shared test helpers for `storesync-core` integration tests.
//!
//! Fixtures build stores, events and jobs with sensible defaults; the
//! `repositories` module holds the in-memory port implementations.

#![allow(dead_code)]

pub mod repositories;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use storesync_common::MockClock;
use storesync_core::SyncSettings;
use storesync_domain::{Job, SyncCursor, WebhookEvent, WebhookStatus, WooStore};

pub const TENANT: &str = "tenant-1";
pub const STORE: &str = "store-1";

/// 2024-05-08 12:00:00 UTC
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap()
}

pub fn mock_clock() -> Arc<MockClock> {
    Arc::new(MockClock::starting_at(SystemTime::from(start_time())))
}

pub fn store(id: &str) -> WooStore {
    WooStore {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        name: Some(format!("Store {id}")),
        base_url: "https://shop.example.com".to_string(),
        api_version: "v3".to_string(),
        consumer_key: "ck_test".to_string(),
        consumer_secret: "cs_test".to_string(),
        active: true,
        last_sync: SyncCursor::default(),
    }
}

/// Settings without inter-page delay
pub fn fast_settings() -> SyncSettings {
    SyncSettings { page_delay: Duration::ZERO, ..SyncSettings::default() }
}

pub fn woo_order(number: u32, total: &str) -> Value {
    json!({
        "id": 1000 + number,
        "number": number.to_string(),
        "status": "processing",
        "total": total,
        "currency": "EUR",
        "billing": {"email": format!("buyer{number}@example.com")},
        "line_items": [{"sku": format!("SKU-{number}"), "name": "Item", "quantity": 1, "total": total}]
    })
}

pub fn woo_product(sku: &str) -> Value {
    json!({"id": 1, "sku": sku, "name": sku, "price": "9.99", "stock_quantity": 4, "status": "publish"})
}

pub fn webhook_event(id: &str, topic: &str, payload: &str, minute: u32) -> WebhookEvent {
    WebhookEvent {
        id: id.to_string(),
        provider: "woocommerce".to_string(),
        topic: topic.to_string(),
        store_id: Some(STORE.to_string()),
        payload: payload.to_string(),
        status: WebhookStatus::Received,
        attempts: 0,
        created_at: Utc.with_ymd_and_hms(2024, 5, 8, 11, minute, 0).unwrap(),
        processed_at: None,
        error: None,
    }
}

pub fn job(name: &str, data: Value) -> Job {
    Job {
        id: format!("job-{name}"),
        name: name.to_string(),
        data,
        attempts: 1,
        max_attempts: 3,
        priority: 0,
        schedule_id: None,
        run_at: start_time(),
        created_at: start_time(),
    }
}
