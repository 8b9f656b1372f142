//! Change requests reviewed by operators and applied by the worker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreSyncError;
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl_domain_status_conversions!(RequestStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Applied => "applied",
});

/// Operator action carried by a `process-request` job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Approve,
    Reject,
    Apply,
}

impl_domain_status_conversions!(RequestAction {
    Approve => "approve",
    Reject => "reject",
    Apply => "apply",
});

impl RequestAction {
    /// Parse an action; anything unknown is a permanent payload error
    pub fn parse(action: &str) -> Result<Self, StoreSyncError> {
        action
            .parse()
            .map_err(|_| StoreSyncError::InvalidPayload(format!("unknown action: {action}")))
    }
}

/// What an approved request changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    StockAdjustment,
    NewProduct,
    OrderNote,
    Other(String),
}

impl RequestKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "STOCK_ADJUSTMENT" => Self::StockAdjustment,
            "NEW_PRODUCT" => Self::NewProduct,
            "ORDER_NOTE" => Self::OrderNote,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::StockAdjustment => "STOCK_ADJUSTMENT",
            Self::NewProduct => "NEW_PRODUCT",
            Self::OrderNote => "ORDER_NOTE",
            Self::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRequest {
    pub id: String,
    pub tenant_id: String,
    pub kind: RequestKind,
    pub payload: Value,
    pub status: RequestStatus,
    pub reviewer_user_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions() {
        assert_eq!(RequestAction::parse("approve").unwrap(), RequestAction::Approve);
        assert_eq!(RequestAction::parse("reject").unwrap(), RequestAction::Reject);
        assert_eq!(RequestAction::parse("apply").unwrap(), RequestAction::Apply);
        assert!(matches!(RequestAction::parse("escalate"), Err(StoreSyncError::InvalidPayload(_))));
    }

    #[test]
    fn kind_codes_round_trip() {
        for code in ["STOCK_ADJUSTMENT", "NEW_PRODUCT", "ORDER_NOTE", "PRICE_CHANGE"] {
            assert_eq!(RequestKind::from_code(code).code(), code);
        }
    }
}
