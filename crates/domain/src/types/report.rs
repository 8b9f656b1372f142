//! Tenant summary reports produced by `generate-report`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreSyncError;
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Orders,
    Products,
}

impl_domain_status_conversions!(ReportType {
    Orders => "orders",
    Products => "products",
});

impl ReportType {
    pub fn parse(raw: &str) -> Result<Self, StoreSyncError> {
        raw.parse()
            .map_err(|_| StoreSyncError::InvalidPayload(format!("unknown report type: {raw}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub tenant_id: String,
    pub report_type: ReportType,
    pub summary: Value,
    pub generated_at: DateTime<Utc>,
}
