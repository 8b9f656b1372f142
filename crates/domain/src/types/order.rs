//! Tenant-scoped orders imported from the upstream store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Local order row, unique per (tenant_id, external_order_no)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    pub external_order_no: String,
    pub order_source: String,
    pub status: String,
    pub mapped_status: String,
    /// Decimal amount kept as text to avoid float rounding
    pub total: Option<String>,
    pub currency: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub payment_method: Option<String>,
    pub confirmed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Line item row owned by one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub qty: i64,
    pub price: Option<String>,
}

/// Line item as mapped from an upstream payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItemDraft {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub qty: i64,
    pub price: Option<String>,
}

/// Write model for an order upsert.
///
/// `items = None` leaves existing line items untouched; `Some` replaces the
/// whole set inside the same transaction as the order write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderUpsert {
    pub tenant_id: String,
    pub external_order_no: String,
    pub order_source: String,
    pub status: String,
    pub mapped_status: String,
    pub total: Option<String>,
    pub currency: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub payment_method: Option<String>,
    pub confirmed_at: DateTime<Utc>,
    pub items: Option<Vec<OrderItemDraft>>,
}

/// Result of an idempotent upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: String,
    pub created: bool,
}
