//! `process-request`: review and apply operator change requests

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use storesync_common::Clock;
use storesync_domain::{
    ChangeRequest, Job, JobName, ProductUpsert, RequestAction, RequestKind, RequestPayload,
    RequestStatus, Result, StoreSyncError,
};
use tracing::{info, instrument, warn};

use crate::clock::utc_now;
use crate::jobs::ports::JobHandler;
use crate::maintenance::ports::RequestRepository;
use crate::sync::ports::{OrderRepository, ProductRepository};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockAdjustment {
    product_id: String,
    quantity: i64,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderNote {
    order_id: String,
    note: String,
}

pub struct ProcessRequestHandler {
    requests: Arc<dyn RequestRepository>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
}

impl ProcessRequestHandler {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { requests, products, orders, clock }
    }

    /// Apply the change an approved request describes
    async fn apply_changes(&self, request: &ChangeRequest) -> Result<bool> {
        match &request.kind {
            RequestKind::StockAdjustment => {
                let change: StockAdjustment = decode(request)?;
                self.requests
                    .apply_stock_adjustment(
                        &request.id,
                        &change.product_id,
                        change.quantity,
                        change.reason.as_deref(),
                    )
                    .await?;
            }
            RequestKind::NewProduct => {
                let mut product: ProductUpsert = decode(request)?;
                product.tenant_id = request.tenant_id.clone();
                if product.sku.trim().is_empty() {
                    return Err(StoreSyncError::InvalidPayload(format!(
                        "request {}: product sku is empty",
                        request.id
                    )));
                }
                self.products.upsert_product(&product).await?;
            }
            RequestKind::OrderNote => {
                let change: OrderNote = decode(request)?;
                self.orders.set_order_note(&change.order_id, &change.note).await?;
            }
            RequestKind::Other(code) => {
                warn!(request_id = %request.id, kind = %code, "Request kind has no automatic change");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn decode<T: serde::de::DeserializeOwned>(request: &ChangeRequest) -> Result<T> {
    serde_json::from_value(request.payload.clone()).map_err(|e| {
        StoreSyncError::InvalidPayload(format!("request {} ({}): {e}", request.id, request.kind.code()))
    })
}

#[async_trait]
impl JobHandler for ProcessRequestHandler {
    fn name(&self) -> JobName {
        JobName::ProcessRequest
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn handle(&self, job: &Job) -> Result<Value> {
        let payload: RequestPayload = job.payload()?;
        let action = RequestAction::parse(&payload.action)?;
        let request = self
            .requests
            .find_request(&payload.request_id)
            .await?
            .ok_or_else(|| StoreSyncError::NotFound(format!("request {}", payload.request_id)))?;
        let reviewer = payload.reviewer_user_id.as_deref();
        let now = utc_now(self.clock.as_ref());

        let (status, applied) = match action {
            RequestAction::Approve => {
                if request.status != RequestStatus::Pending {
                    info!(request_id = %request.id, status = %request.status, "Request already reviewed");
                    return Ok(json!({
                        "success": true,
                        "requestId": request.id,
                        "status": request.status.as_str(),
                        "applied": false,
                    }));
                }
                let applied = self.apply_changes(&request).await?;
                (RequestStatus::Approved, applied)
            }
            RequestAction::Reject => (RequestStatus::Rejected, false),
            RequestAction::Apply => (RequestStatus::Applied, false),
        };

        self.requests.update_status(&request.id, status, reviewer, now).await?;
        info!(request_id = %request.id, %action, %status, applied, "Request processed");

        Ok(json!({
            "success": true,
            "requestId": request.id,
            "status": status.as_str(),
            "applied": applied,
        }))
    }
}
