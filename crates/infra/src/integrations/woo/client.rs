//! WooCommerce REST client for paged list calls

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde_json::Value;
use storesync_common::resilience::credential_key;
use storesync_common::{CircuitBreakerRegistry, SlidingWindowLimiter};
use storesync_core::{PageRequest, UpstreamCatalog};
use storesync_domain::constants::UPSTREAM_PROVIDER;
use storesync_domain::{EntityType, Result, StoreSyncError, SyncConfig, WooStore};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::errors::InfraError;

/// Longest slice of an error body kept in the error message
const BODY_SNIPPET_LEN: usize = 256;

/// Upstream client guarded per store credential by the shared sliding-window
/// limiter and the process-wide breaker registry.
#[derive(Clone)]
pub struct WooClient {
    http: ReqwestClient,
    limiter: SlidingWindowLimiter,
    breakers: Arc<CircuitBreakerRegistry>,
    rate_limit: u32,
    rate_window: Duration,
}

impl WooClient {
    pub fn new(
        limiter: SlidingWindowLimiter,
        breakers: Arc<CircuitBreakerRegistry>,
        settings: &SyncConfig,
    ) -> Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(settings.request_timeout())
            .user_agent(concat!("storesync-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| StoreSyncError::from(InfraError::from(err)))?;

        Ok(Self {
            http,
            limiter,
            breakers,
            rate_limit: settings.upstream_rate_limit,
            rate_window: settings.upstream_rate_window(),
        })
    }

    async fn get_page(&self, url: Url, store: &WooStore) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(url)
            .basic_auth(&store.consumer_key, Some(&store.consumer_secret))
            .send()
            .await
            .map_err(|err| StoreSyncError::from(InfraError::from(err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(store_id = %store.id, status = status.as_u16(), "upstream list call rejected");
            return Err(upstream_error(status, &body));
        }

        let body: Value =
            response.json().await.map_err(|err| StoreSyncError::from(InfraError::from(err)))?;
        match body {
            Value::Array(records) => Ok(records),
            other => Err(StoreSyncError::InvalidPayload(format!(
                "expected a JSON array from the list endpoint, got {}",
                json_kind(&other)
            ))),
        }
    }
}

#[async_trait]
impl UpstreamCatalog for WooClient {
    #[instrument(skip(self, store), fields(store_id = %store.id, entity = %request.entity, page = request.page))]
    async fn fetch_page(&self, store: &WooStore, request: &PageRequest) -> Result<Vec<Value>> {
        let url = list_url(store, request)?;

        let key = credential_key(UPSTREAM_PROVIDER, &store.id);
        let remaining = self
            .limiter
            .acquire(&key, self.rate_limit, self.rate_window)
            .await
            .map_err(|err| StoreSyncError::from(InfraError::from(err)))?;
        debug!(remaining, "upstream call admitted");

        let records = self
            .breakers
            .guard(&store.id, || self.get_page(url, store))
            .await
            .map_err(|err| StoreSyncError::from(InfraError::from(err)))?;

        debug!(records = records.len(), "upstream page fetched");
        Ok(records)
    }
}

/// `{base}/wp-json/wc/{version}/{entity}` with paging and modification filters
pub(crate) fn list_url(store: &WooStore, request: &PageRequest) -> Result<Url> {
    let base = Url::parse(&store.base_url).map_err(|err| {
        StoreSyncError::Config(format!("store {} has an invalid base url: {err}", store.id))
    })?;
    let path = format!("/wp-json/wc/{}/{}", store.api_version, request.entity.as_str());
    let mut url = base
        .join(&path)
        .map_err(|err| StoreSyncError::Config(format!("store {}: {err}", store.id)))?;

    let order_by = match request.entity {
        EntityType::Orders => "date_modified",
        EntityType::Products => "modified",
    };
    url.query_pairs_mut()
        .append_pair("per_page", &request.per_page.to_string())
        .append_pair("page", &request.page.to_string())
        .append_pair("orderby", order_by)
        .append_pair("order", "asc")
        .append_pair(
            "modified_after",
            &request.modified_after.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    Ok(url)
}

fn upstream_error(status: StatusCode, body: &str) -> StoreSyncError {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let snippet: String = body.trim().chars().take(BODY_SNIPPET_LEN).collect();
    let message = if snippet.is_empty() { reason.to_string() } else { format!("{reason}: {snippet}") };
    StoreSyncError::Upstream { status: status.as_u16(), message }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use storesync_domain::SyncCursor;

    use super::*;

    fn store(base_url: &str) -> WooStore {
        WooStore {
            id: "store-1".into(),
            tenant_id: "tenant-1".into(),
            name: None,
            base_url: base_url.into(),
            api_version: "v3".into(),
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            active: true,
            last_sync: SyncCursor::default(),
        }
    }

    fn request(entity: EntityType) -> PageRequest {
        PageRequest {
            entity,
            page: 2,
            per_page: 50,
            modified_after: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn builds_order_list_url() {
        let url = list_url(&store("https://shop.example.com/"), &request(EntityType::Orders)).unwrap();
        assert_eq!(url.path(), "/wp-json/wc/v3/orders");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("page".into(), "2".into())));
        assert!(query.contains(&("per_page".into(), "50".into())));
        assert!(query.contains(&("orderby".into(), "date_modified".into())));
        assert!(query.contains(&("modified_after".into(), "2024-05-01T12:00:00.000Z".into())));
    }

    #[test]
    fn product_listing_orders_by_modified() {
        let url = list_url(&store("https://shop.example.com"), &request(EntityType::Products)).unwrap();
        assert_eq!(url.path(), "/wp-json/wc/v3/products");
        assert!(url.query_pairs().any(|(k, v)| k == "orderby" && v == "modified"));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = list_url(&store("not a url"), &request(EntityType::Orders)).unwrap_err();
        assert!(matches!(err, StoreSyncError::Config(_)));
    }

    #[test]
    fn upstream_error_keeps_status_and_snippet() {
        let err = upstream_error(StatusCode::SERVICE_UNAVAILABLE, " maintenance ");
        match err {
            StoreSyncError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable: maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
