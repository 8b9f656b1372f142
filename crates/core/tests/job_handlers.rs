//! Handler-level behaviour for request, report and housekeeping jobs

mod support;

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use storesync_core::jobs::handlers::{
    CleanupCacheHandler, GenerateReportHandler, ProcessRequestHandler, StoreSyncHandler,
};
use storesync_core::jobs::ports::JobHandler;
use storesync_core::maintenance::ports::{CacheJanitor, ReportRepository};
use storesync_core::SyncEngine;
use storesync_domain::{
    ChangeRequest, Report, ReportType, RequestKind, RequestStatus, Result as DomainResult,
    StoreSyncError,
};
use support::repositories::{
    MockOrderRepository, MockProductRepository, MockRequestRepository, MockStoreRepository,
    RecordingMetrics, ScriptedUpstream,
};
use support::{fast_settings, job, mock_clock, start_time, store, TENANT};

fn change_request(id: &str, kind: RequestKind, payload: Value) -> ChangeRequest {
    ChangeRequest {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        kind,
        payload,
        status: RequestStatus::Pending,
        reviewer_user_id: None,
        reviewed_at: None,
        applied_at: None,
    }
}

struct RequestHarness {
    requests: Arc<MockRequestRepository>,
    products: Arc<MockProductRepository>,
    orders: Arc<MockOrderRepository>,
    handler: ProcessRequestHandler,
}

fn request_harness(requests: Vec<ChangeRequest>) -> RequestHarness {
    let requests = Arc::new(MockRequestRepository::new(requests));
    let products = Arc::new(MockProductRepository::default());
    let orders = Arc::new(MockOrderRepository::default());
    let handler =
        ProcessRequestHandler::new(requests.clone(), products.clone(), orders.clone(), mock_clock());
    RequestHarness { requests, products, orders, handler }
}

#[tokio::test]
async fn approving_stock_adjustment_moves_stock_once() {
    let h = request_harness(vec![change_request(
        "r1",
        RequestKind::StockAdjustment,
        json!({"productId": "p1", "quantity": -3, "reason": "damaged"}),
    )]);
    let approve = job("process-request", json!({"requestId": "r1", "action": "approve", "reviewerUserId": "u9"}));

    let result = h.handler.handle(&approve).await.unwrap();
    assert_eq!(result["status"], "approved");
    assert_eq!(result["applied"], true);

    let request = h.requests.request("r1").unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.reviewer_user_id.as_deref(), Some("u9"));
    assert_eq!(request.reviewed_at, Some(start_time()));
    assert_eq!(h.requests.movements(), vec![("r1".to_string(), "p1".to_string(), -3)]);

    // Redelivery of the same approval does not apply twice
    let again = h.handler.handle(&approve).await.unwrap();
    assert_eq!(again["applied"], false);
    assert_eq!(h.requests.movements().len(), 1);
}

#[tokio::test]
async fn approving_new_product_and_order_note() {
    let h = request_harness(vec![
        change_request("r1", RequestKind::NewProduct, json!({"sku": "NEW-1", "name": "Lamp", "price": "30.00"})),
        change_request("r2", RequestKind::OrderNote, json!({"orderId": "ord-1", "note": "gift"})),
    ]);

    h.handler.handle(&job("process-request", json!({"requestId": "r1", "action": "approve"}))).await.unwrap();
    h.handler.handle(&job("process-request", json!({"requestId": "r2", "action": "approve"}))).await.unwrap();

    let product = h.products.get(TENANT, "NEW-1").unwrap();
    assert_eq!(product.name.as_deref(), Some("Lamp"));
    assert!(product.active);
    assert_eq!(h.orders.note("ord-1").as_deref(), Some("gift"));
}

#[tokio::test]
async fn reject_and_apply_only_change_status() {
    let h = request_harness(vec![
        change_request("r1", RequestKind::StockAdjustment, json!({"productId": "p1", "quantity": 5})),
        change_request("r2", RequestKind::OrderNote, json!({"orderId": "o1", "note": "x"})),
    ]);

    h.handler.handle(&job("process-request", json!({"requestId": "r1", "action": "reject"}))).await.unwrap();
    h.handler.handle(&job("process-request", json!({"requestId": "r2", "action": "apply"}))).await.unwrap();

    assert_eq!(h.requests.request("r1").unwrap().status, RequestStatus::Rejected);
    let applied = h.requests.request("r2").unwrap();
    assert_eq!(applied.status, RequestStatus::Applied);
    assert_eq!(applied.applied_at, Some(start_time()));
    assert!(h.requests.movements().is_empty());
    assert_eq!(h.orders.note("o1"), None);
}

#[tokio::test]
async fn unknown_action_and_missing_request_are_permanent() {
    let h = request_harness(vec![]);

    let err = h
        .handler
        .handle(&job("process-request", json!({"requestId": "r1", "action": "escalate"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreSyncError::InvalidPayload(_)));

    let err = h
        .handler
        .handle(&job("process-request", json!({"requestId": "nope", "action": "approve"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreSyncError::NotFound(_)));
    assert!(!err.is_retryable());
}

#[derive(Default)]
struct MockReports {
    saved: Mutex<Vec<Report>>,
}

#[async_trait]
impl ReportRepository for MockReports {
    async fn summarize(&self, tenant_id: &str, report_type: ReportType) -> DomainResult<Value> {
        Ok(json!({"tenantId": tenant_id, "type": report_type.as_str(), "count": 3}))
    }

    async fn save_report(&self, report: &Report) -> DomainResult<()> {
        self.saved.lock().unwrap().push(report.clone());
        Ok(())
    }
}

#[tokio::test]
async fn generate_report_persists_summary() {
    let reports = Arc::new(MockReports::default());
    let handler = GenerateReportHandler::new(reports.clone(), mock_clock());

    let result = handler
        .handle(&job("generate-report", json!({"tenantId": TENANT, "reportType": "orders"})))
        .await
        .unwrap();

    assert_eq!(result["summary"]["count"], 3);
    let saved = reports.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].report_type, ReportType::Orders);
    assert_eq!(saved[0].generated_at, start_time());

    drop(saved);
    let err = handler
        .handle(&job("generate-report", json!({"tenantId": TENANT, "reportType": "weekly"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreSyncError::InvalidPayload(_)));
}

struct CountingJanitor(Mutex<Vec<(String, i64)>>);

#[async_trait]
impl CacheJanitor for CountingJanitor {
    async fn expire_untimed_keys(&self, pattern: &str, ttl_secs: i64) -> DomainResult<u64> {
        self.0.lock().unwrap().push((pattern.to_string(), ttl_secs));
        Ok(4)
    }
}

#[tokio::test]
async fn cleanup_cache_targets_cache_namespace() {
    let janitor = Arc::new(CountingJanitor(Mutex::default()));
    let result = CleanupCacheHandler::new(janitor.clone()).handle(&job("cleanup-cache", json!({}))).await.unwrap();

    assert_eq!(result["keysExpired"], 4);
    assert_eq!(*janitor.0.lock().unwrap(), vec![("cache:*".to_string(), 3_600)]);
}

#[tokio::test]
async fn store_sync_handler_requires_store_id() {
    let engine = Arc::new(SyncEngine::new(
        Arc::new(MockStoreRepository::new(vec![store("s1")])),
        Arc::new(MockOrderRepository::default()),
        Arc::new(MockProductRepository::default()),
        Arc::new(ScriptedUpstream::default()),
        Arc::new(RecordingMetrics::default()),
        mock_clock(),
        fast_settings(),
    ));
    let handler = StoreSyncHandler::orders(engine);

    let err = handler.handle(&job("woo-sync-orders", json!({}))).await.unwrap_err();
    assert!(matches!(err, StoreSyncError::InvalidPayload(_)));

    let ok = handler.handle(&job("woo-sync-orders", json!({"storeId": "s1"}))).await.unwrap();
    assert_eq!(ok["imported"], 0);
    assert_eq!(ok["pages"], 1);
}
