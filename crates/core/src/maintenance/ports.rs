//! Port interfaces for housekeeping, reports and change requests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use storesync_domain::{ChangeRequest, Report, ReportType, RequestStatus, Result};

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Delete sessions whose expiry is before `now`; returns rows removed
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Shared cache housekeeping
#[async_trait]
pub trait CacheJanitor: Send + Sync {
    /// Give every key matching `pattern` that has no TTL a TTL of
    /// `ttl_secs`; returns keys touched
    async fn expire_untimed_keys(&self, pattern: &str, ttl_secs: i64) -> Result<u64>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Aggregate the tenant's data for `report_type`
    async fn summarize(&self, tenant_id: &str, report_type: ReportType) -> Result<Value>;

    async fn save_report(&self, report: &Report) -> Result<()>;
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_request(&self, request_id: &str) -> Result<Option<ChangeRequest>>;

    async fn update_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        reviewer_user_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Record a stock movement and increment the product stock atomically
    async fn apply_stock_adjustment(
        &self,
        request_id: &str,
        product_id: &str,
        quantity: i64,
        reason: Option<&str>,
    ) -> Result<()>;
}
