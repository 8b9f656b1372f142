//! In-memory implementations of the core ports
//!
//! Every mock keeps its state behind a mutex so a test can hand an `Arc` to
//! the component under test and inspect the same instance afterwards.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use storesync_core::jobs::ports::{JobFailureRepository, JobQueue, ScheduleRepository};
use storesync_core::maintenance::ports::RequestRepository;
use storesync_core::metrics_ports::{JobOutcome, WorkerMetricsPort};
use storesync_core::sync::ports::{
    OrderRepository, PageRequest, ProductRepository, StoreRepository, UpstreamCatalog,
    WebhookEventRepository,
};
use storesync_domain::{
    ChangeRequest, EntityType, Job, JobFailure, JobRequest, Order, OrderUpsert, Product,
    ProductUpsert, RecurringSchedule, RequestStatus, Result as DomainResult, StoreSyncError,
    UpsertOutcome, WebhookEvent, WebhookStatus, WooStore,
};

// ============================================================================
// Stores
// ============================================================================

#[derive(Default)]
pub struct MockStoreRepository {
    stores: Mutex<HashMap<String, WooStore>>,
}

impl MockStoreRepository {
    pub fn new(stores: Vec<WooStore>) -> Self {
        Self { stores: Mutex::new(stores.into_iter().map(|s| (s.id.clone(), s)).collect()) }
    }

    pub fn cursor(&self, store_id: &str, entity: EntityType) -> Option<DateTime<Utc>> {
        self.stores.lock().unwrap().get(store_id).and_then(|s| s.last_sync.get(entity))
    }

    pub fn set_active(&self, store_id: &str, active: bool) {
        if let Some(store) = self.stores.lock().unwrap().get_mut(store_id) {
            store.active = active;
        }
    }
}

#[async_trait]
impl StoreRepository for MockStoreRepository {
    async fn find_store(&self, store_id: &str) -> DomainResult<Option<WooStore>> {
        Ok(self.stores.lock().unwrap().get(store_id).cloned())
    }

    async fn list_active_stores(&self) -> DomainResult<Vec<WooStore>> {
        let mut active: Vec<WooStore> =
            self.stores.lock().unwrap().values().filter(|s| s.active).cloned().collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn advance_cursor(
        &self,
        store_id: &str,
        entity: EntityType,
        to: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut stores = self.stores.lock().unwrap();
        let store = stores
            .get_mut(store_id)
            .ok_or_else(|| StoreSyncError::NotFound(format!("store {store_id}")))?;
        Ok(store.last_sync.advance(entity, to))
    }
}

// ============================================================================
// Orders and products
// ============================================================================

#[derive(Default)]
pub struct MockOrderRepository {
    orders: Mutex<HashMap<(String, String), (String, OrderUpsert)>>,
    notes: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
}

impl MockOrderRepository {
    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn get(&self, tenant_id: &str, external_order_no: &str) -> Option<OrderUpsert> {
        self.orders
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), external_order_no.to_string()))
            .map(|(_, order)| order.clone())
    }

    pub fn note(&self, order_id: &str) -> Option<String> {
        self.notes.lock().unwrap().get(order_id).cloned()
    }
}

#[async_trait]
impl OrderRepository for MockOrderRepository {
    async fn upsert_order(&self, order: &OrderUpsert) -> DomainResult<UpsertOutcome> {
        *self.writes.lock().unwrap() += 1;
        let mut orders = self.orders.lock().unwrap();
        let key = (order.tenant_id.clone(), order.external_order_no.clone());
        match orders.get_mut(&key) {
            Some((id, existing)) => {
                let items = order.items.clone().or_else(|| existing.items.clone());
                *existing = OrderUpsert { items, ..order.clone() };
                Ok(UpsertOutcome { id: id.clone(), created: false })
            }
            None => {
                let id = format!("ord-{}", orders.len() + 1);
                orders.insert(key, (id.clone(), order.clone()));
                Ok(UpsertOutcome { id, created: true })
            }
        }
    }

    async fn find_order(
        &self,
        tenant_id: &str,
        external_order_no: &str,
    ) -> DomainResult<Option<Order>> {
        Ok(self.get(tenant_id, external_order_no).map(|o| Order {
            id: String::new(),
            tenant_id: o.tenant_id,
            external_order_no: o.external_order_no,
            order_source: o.order_source,
            status: o.status,
            mapped_status: o.mapped_status,
            total: o.total,
            currency: o.currency,
            customer_email: o.customer_email,
            customer_phone: o.customer_phone,
            shipping_address: o.shipping_address,
            billing_address: o.billing_address,
            payment_method: o.payment_method,
            confirmed_at: o.confirmed_at,
            notes: None,
            created_at: o.confirmed_at,
            updated_at: o.confirmed_at,
            items: Vec::new(),
        }))
    }

    async fn set_order_note(&self, order_id: &str, note: &str) -> DomainResult<()> {
        self.notes.lock().unwrap().insert(order_id.to_string(), note.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockProductRepository {
    products: Mutex<HashMap<(String, String), ProductUpsert>>,
}

impl MockProductRepository {
    pub fn count(&self) -> usize {
        self.products.lock().unwrap().len()
    }

    pub fn get(&self, tenant_id: &str, sku: &str) -> Option<ProductUpsert> {
        self.products.lock().unwrap().get(&(tenant_id.to_string(), sku.to_string())).cloned()
    }
}

#[async_trait]
impl ProductRepository for MockProductRepository {
    async fn upsert_product(&self, product: &ProductUpsert) -> DomainResult<UpsertOutcome> {
        let mut products = self.products.lock().unwrap();
        let created = products
            .insert((product.tenant_id.clone(), product.sku.clone()), product.clone())
            .is_none();
        Ok(UpsertOutcome { id: format!("prd-{}", product.sku), created })
    }

    async fn find_product(&self, tenant_id: &str, sku: &str) -> DomainResult<Option<Product>> {
        Ok(self.get(tenant_id, sku).map(|p| Product {
            id: format!("prd-{}", p.sku),
            tenant_id: p.tenant_id,
            sku: p.sku,
            name: p.name,
            price: p.price,
            stock: p.stock,
            images: p.images,
            tags: p.tags,
            active: p.active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
    }
}

// ============================================================================
// Webhook events
// ============================================================================

#[derive(Default)]
pub struct MockWebhookEventRepository {
    events: Mutex<Vec<WebhookEvent>>,
}

impl MockWebhookEventRepository {
    pub fn new(events: Vec<WebhookEvent>) -> Self {
        Self { events: Mutex::new(events) }
    }

    pub fn event(&self, id: &str) -> Option<WebhookEvent> {
        self.events.lock().unwrap().iter().find(|e| e.id == id).cloned()
    }

    fn transition(&self, id: &str, apply: impl FnOnce(&mut WebhookEvent)) -> DomainResult<()> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == id && e.status == WebhookStatus::Received)
            .ok_or_else(|| StoreSyncError::NotFound(format!("received event {id}")))?;
        event.attempts += 1;
        apply(event);
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepository for MockWebhookEventRepository {
    async fn fetch_received(&self, provider: &str, limit: u32) -> DomainResult<Vec<WebhookEvent>> {
        let mut received: Vec<WebhookEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.provider == provider && e.status == WebhookStatus::Received)
            .cloned()
            .collect();
        received.sort_by_key(|e| e.created_at);
        received.truncate(limit as usize);
        Ok(received)
    }

    async fn mark_processed(&self, id: &str, processed_at: DateTime<Utc>) -> DomainResult<()> {
        self.transition(id, |e| {
            e.status = WebhookStatus::Processed;
            e.processed_at = Some(processed_at);
        })
    }

    async fn mark_failed(&self, id: &str, error: &str) -> DomainResult<()> {
        self.transition(id, |e| {
            e.status = WebhookStatus::Failed;
            e.error = Some(error.to_string());
        })
    }
}

// ============================================================================
// Upstream
// ============================================================================

/// Serves fixed pages per entity and can fail one page with a status
#[derive(Default)]
pub struct ScriptedUpstream {
    pages: Mutex<HashMap<EntityType, Vec<Vec<Value>>>>,
    failure: Mutex<Option<(u32, u16)>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedUpstream {
    pub fn with_pages(self, entity: EntityType, pages: Vec<Vec<Value>>) -> Self {
        self.pages.lock().unwrap().insert(entity, pages);
        self
    }

    pub fn fail_page(&self, page: u32, status: u16) {
        *self.failure.lock().unwrap() = Some((page, status));
    }

    pub fn heal(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl UpstreamCatalog for ScriptedUpstream {
    async fn fetch_page(&self, _store: &WooStore, request: &PageRequest) -> DomainResult<Vec<Value>> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((page, status)) = *self.failure.lock().unwrap() {
            if page == request.page {
                return Err(StoreSyncError::Upstream { status, message: "scripted failure".into() });
            }
        }
        let index = request.page as usize - 1;
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&request.entity)
            .and_then(|pages| pages.get(index).cloned())
            .unwrap_or_default())
    }
}

// ============================================================================
// Metrics and failures
// ============================================================================

#[derive(Default)]
pub struct RecordingMetrics {
    jobs: Mutex<Vec<(String, JobOutcome)>>,
    lag: Mutex<HashMap<(String, EntityType), f64>>,
}

impl RecordingMetrics {
    pub fn jobs(&self) -> Vec<(String, JobOutcome)> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn count(&self, outcome: JobOutcome) -> usize {
        self.jobs.lock().unwrap().iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn lag(&self, store_id: &str, entity: EntityType) -> Option<f64> {
        self.lag.lock().unwrap().get(&(store_id.to_string(), entity)).copied()
    }
}

impl WorkerMetricsPort for RecordingMetrics {
    fn record_job(&self, job_name: &str, outcome: JobOutcome, _duration: Duration) {
        self.jobs.lock().unwrap().push((job_name.to_string(), outcome));
    }

    fn set_sync_lag(&self, store_id: &str, entity: EntityType, lag_seconds: f64) {
        self.lag.lock().unwrap().insert((store_id.to_string(), entity), lag_seconds);
    }
}

#[derive(Default)]
pub struct MockFailureRepository {
    failures: Mutex<Vec<JobFailure>>,
}

impl MockFailureRepository {
    pub fn failures(&self) -> Vec<JobFailure> {
        self.failures.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobFailureRepository for MockFailureRepository {
    async fn record_failure(&self, failure: &JobFailure) -> DomainResult<()> {
        self.failures.lock().unwrap().push(failure.clone());
        Ok(())
    }

    async fn list_failures(&self, limit: u32) -> DomainResult<Vec<JobFailure>> {
        let failures = self.failures.lock().unwrap();
        Ok(failures.iter().rev().take(limit as usize).cloned().collect())
    }
}

// ============================================================================
// Queue and schedules
// ============================================================================

#[derive(Default)]
pub struct MockJobQueue {
    jobs: Mutex<Vec<JobRequest>>,
    /// Dedupe keys treated as still pending
    pending: Mutex<Vec<String>>,
}

impl MockJobQueue {
    pub fn enqueued(&self) -> Vec<JobRequest> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn drain(&self) {
        self.pending.lock().unwrap().clear();
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn enqueue(&self, request: JobRequest) -> DomainResult<Option<String>> {
        let mut pending = self.pending.lock().unwrap();
        if let Some(key) = &request.dedupe_key {
            if pending.contains(key) {
                return Ok(None);
            }
            pending.push(key.clone());
        }
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(request);
        Ok(Some(format!("job-{}", jobs.len())))
    }

    async fn claim_next(&self, _now: DateTime<Utc>, _lease: Duration) -> DomainResult<Option<Job>> {
        Ok(None)
    }

    async fn extend_lease(&self, _job: &Job, _until: DateTime<Utc>) -> DomainResult<bool> {
        Ok(true)
    }

    async fn complete(&self, _job: &Job) -> DomainResult<bool> {
        Ok(true)
    }

    async fn fail(
        &self,
        _job: &Job,
        _error: &str,
        _retry_at: Option<DateTime<Utc>>,
    ) -> DomainResult<bool> {
        Ok(true)
    }

    async fn recover_stalled(&self, _now: DateTime<Utc>) -> DomainResult<u64> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct MockScheduleRepository {
    schedules: Mutex<HashMap<String, RecurringSchedule>>,
}

impl MockScheduleRepository {
    pub fn get(&self, id: &str) -> Option<RecurringSchedule> {
        self.schedules.lock().unwrap().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schedules.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ScheduleRepository for MockScheduleRepository {
    async fn upsert_schedule(&self, schedule: &RecurringSchedule) -> DomainResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        let next_run_at = match schedules.get(&schedule.id) {
            Some(existing) if existing.pattern == schedule.pattern => existing.next_run_at,
            _ => schedule.next_run_at,
        };
        schedules.insert(schedule.id.clone(), RecurringSchedule { next_run_at, ..schedule.clone() });
        Ok(())
    }

    async fn list_schedules(&self) -> DomainResult<Vec<RecurringSchedule>> {
        Ok(self.schedules.lock().unwrap().values().cloned().collect())
    }

    async fn due_schedules(&self, now: DateTime<Utc>) -> DomainResult<Vec<RecurringSchedule>> {
        let mut due: Vec<RecurringSchedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.enabled && s.next_run_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn set_next_run(&self, id: &str, next_run_at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(schedule) = self.schedules.lock().unwrap().get_mut(id) {
            schedule.next_run_at = next_run_at;
        }
        Ok(())
    }

    async fn remove_schedule(&self, id: &str) -> DomainResult<bool> {
        Ok(self.schedules.lock().unwrap().remove(id).is_some())
    }
}

// ============================================================================
// Change requests
// ============================================================================

#[derive(Default)]
pub struct MockRequestRepository {
    requests: Mutex<HashMap<String, ChangeRequest>>,
    movements: Mutex<Vec<(String, String, i64)>>,
}

impl MockRequestRepository {
    pub fn new(requests: Vec<ChangeRequest>) -> Self {
        Self {
            requests: Mutex::new(requests.into_iter().map(|r| (r.id.clone(), r)).collect()),
            movements: Mutex::default(),
        }
    }

    pub fn request(&self, id: &str) -> Option<ChangeRequest> {
        self.requests.lock().unwrap().get(id).cloned()
    }

    pub fn movements(&self) -> Vec<(String, String, i64)> {
        self.movements.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestRepository for MockRequestRepository {
    async fn find_request(&self, request_id: &str) -> DomainResult<Option<ChangeRequest>> {
        Ok(self.request(request_id))
    }

    async fn update_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        reviewer_user_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut requests = self.requests.lock().unwrap();
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| StoreSyncError::NotFound(format!("request {request_id}")))?;
        request.status = status;
        if let Some(reviewer) = reviewer_user_id {
            request.reviewer_user_id = Some(reviewer.to_string());
        }
        match status {
            RequestStatus::Applied => request.applied_at = Some(at),
            _ => request.reviewed_at = Some(at),
        }
        Ok(())
    }

    async fn apply_stock_adjustment(
        &self,
        request_id: &str,
        product_id: &str,
        quantity: i64,
        _reason: Option<&str>,
    ) -> DomainResult<()> {
        self.movements.lock().unwrap().push((request_id.to_string(), product_id.to_string(), quantity));
        Ok(())
    }
}
