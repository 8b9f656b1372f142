//! Connected stores and their sync cursors

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, StoreSyncError};
use crate::impl_domain_status_conversions;

/// Entity kinds pulled from the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Orders,
    Products,
}

impl_domain_status_conversions!(EntityType {
    Orders => "orders",
    Products => "products",
});

/// A connected WooCommerce store owned by one tenant
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WooStore {
    pub id: String,
    pub tenant_id: String,
    pub name: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub active: bool,
    pub last_sync: SyncCursor,
}

impl fmt::Debug for WooStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WooStore")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("active", &self.active)
            .field("consumer_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Per-store high-water marks, persisted as JSON on the store record.
///
/// Known keys are typed; anything else written by other services is kept in
/// `extra` and written back untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders_updated_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_updated_after: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SyncCursor {
    /// Parse the stored JSON; empty or `null` means never synced
    pub fn from_json(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("" | "null") => Ok(Self::default()),
            Some(text) => serde_json::from_str(text)
                .map_err(|e| StoreSyncError::InvalidPayload(format!("sync cursor: {e}"))),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StoreSyncError::Internal(e.to_string()))
    }

    pub const fn get(&self, entity: EntityType) -> Option<DateTime<Utc>> {
        match entity {
            EntityType::Orders => self.orders_updated_after,
            EntityType::Products => self.products_updated_after,
        }
    }

    /// Lower bound for the next sweep: the stored mark, or `now - lookback`
    pub fn since(&self, entity: EntityType, now: DateTime<Utc>, lookback: Duration) -> DateTime<Utc> {
        self.get(entity).unwrap_or(now - lookback)
    }

    /// Move the mark forward to `to`. Returns false and leaves the cursor
    /// alone when `to` would not advance it.
    pub fn advance(&mut self, entity: EntityType, to: DateTime<Utc>) -> bool {
        let slot = match entity {
            EntityType::Orders => &mut self.orders_updated_after,
            EntityType::Products => &mut self.products_updated_after,
        };
        if slot.is_some_and(|current| current >= to) {
            return false;
        }
        *slot = Some(to);
        true
    }
}
