//! Webhook events recorded by the external receiver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Reconciliation status.
///
/// Transitions only `Received -> Processed` or `Received -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Received,
    Processed,
    Failed,
}

impl_domain_status_conversions!(WebhookStatus {
    Received => "received",
    Processed => "processed",
    Failed => "failed",
});

/// Topic family, taken from the prefix before the first dot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTopic {
    Order,
    Product,
    Other,
}

impl WebhookTopic {
    pub fn classify(topic: &str) -> Self {
        match topic.split('.').next().unwrap_or_default() {
            "order" => Self::Order,
            "product" => Self::Product,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub provider: String,
    pub topic: String,
    pub store_id: Option<String>,
    /// Raw body as received; parsed during reconciliation
    pub payload: String,
    pub status: WebhookStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WebhookEvent {
    pub fn topic_kind(&self) -> WebhookTopic {
        WebhookTopic::classify(&self.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_prefix() {
        assert_eq!(WebhookTopic::classify("order.updated"), WebhookTopic::Order);
        assert_eq!(WebhookTopic::classify("order.created"), WebhookTopic::Order);
        assert_eq!(WebhookTopic::classify("product.deleted"), WebhookTopic::Product);
        assert_eq!(WebhookTopic::classify("orders.updated"), WebhookTopic::Other);
        assert_eq!(WebhookTopic::classify("coupon.created"), WebhookTopic::Other);
        assert_eq!(WebhookTopic::classify(""), WebhookTopic::Other);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [WebhookStatus::Received, WebhookStatus::Processed, WebhookStatus::Failed] {
            assert_eq!(status.as_str().parse::<WebhookStatus>().unwrap(), status);
        }
    }
}
