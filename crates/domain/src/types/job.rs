//! Job envelopes, typed payloads and failure audit records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, StoreSyncError};
use crate::impl_domain_status_conversions;

/// Every job name the runtime knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    WooSyncOrders,
    WooSyncProducts,
    ProcessWebhookEvents,
    WooSchedule,
    CleanupCache,
    CleanupSessions,
    GenerateReport,
    ProcessRequest,
}

impl_domain_status_conversions!(JobName {
    WooSyncOrders => "woo-sync-orders",
    WooSyncProducts => "woo-sync-products",
    ProcessWebhookEvents => "process-webhook-events",
    WooSchedule => "woo-schedule",
    CleanupCache => "cleanup-cache",
    CleanupSessions => "cleanup-sessions",
    GenerateReport => "generate-report",
    ProcessRequest => "process-request",
});

impl JobName {
    pub const ALL: [Self; 8] = [
        Self::WooSyncOrders,
        Self::WooSyncProducts,
        Self::ProcessWebhookEvents,
        Self::WooSchedule,
        Self::CleanupCache,
        Self::CleanupSessions,
        Self::GenerateReport,
        Self::ProcessRequest,
    ];

    /// Stable schedule id for a per-store recurring job, e.g.
    /// `woo-sync-orders:<storeId>`
    pub fn store_schedule_id(self, store_id: &str) -> String {
        format!("{}:{store_id}", self.as_str())
    }
}

/// Queue lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl_domain_status_conversions!(JobStatus {
    Waiting => "waiting",
    Active => "active",
    Completed => "completed",
    Failed => "failed",
});

/// A claimed unit of work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub data: Value,
    /// Deliveries so far, including the current one
    pub attempts: u32,
    pub max_attempts: u32,
    pub priority: i32,
    /// Stable key of the schedule that produced this job, if any
    pub schedule_id: Option<String>,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Decode `data` into a typed payload; malformed data is permanent
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            StoreSyncError::InvalidPayload(format!("{} payload: {e}", self.name))
        })
    }
}

/// Request to enqueue a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub name: String,
    pub data: Value,
    /// Higher runs first
    pub priority: i32,
    pub delay: Duration,
    /// Jobs sharing a key are deduplicated while one is waiting or active
    pub dedupe_key: Option<String>,
}

impl JobRequest {
    pub fn new(name: JobName, data: Value) -> Self {
        Self {
            name: name.as_str().to_string(),
            data,
            priority: 0,
            delay: Duration::ZERO,
            dedupe_key: None,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }
}

/// Recurring schedule registered under a stable id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSchedule {
    /// `woo-sync-orders:<storeId>` for per-store schedules, the job name otherwise
    pub id: String,
    pub job_name: String,
    pub data: Value,
    /// Five-field cron pattern
    pub pattern: String,
    pub priority: i32,
    pub next_run_at: DateTime<Utc>,
    pub enabled: bool,
}

/// Structured failure audit entry written when a job exhausts its attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub id: String,
    pub job_id: String,
    pub job_name: String,
    pub payload: Value,
    pub error_kind: String,
    pub error: String,
    pub attempt_count: u32,
    pub failed_at: DateTime<Utc>,
}

/// Payload of `woo-sync-orders` and `woo-sync-products`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorePayload {
    pub store_id: String,
}

/// Payload of `generate-report`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub tenant_id: String,
    pub report_type: String,
}

/// Payload of `process-request`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub request_id: String,
    pub action: String,
    #[serde(default)]
    pub reviewer_user_id: Option<String>,
}
