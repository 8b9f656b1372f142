//! Worker context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use storesync_common::{
    CircuitBreakerConfig, CircuitBreakerRegistry, Clock, SlidingWindowLimiter, SystemClock,
};
use storesync_core::jobs::handlers::{
    CleanupCacheHandler, CleanupSessionsHandler, GenerateReportHandler, ProcessRequestHandler,
    StoreSyncHandler, WebhookEventsHandler, WooScheduleHandler,
};
use storesync_core::{
    JobQueue, JobRuntime, RecurringCatalog, RetryPolicy, SyncEngine, SyncSettings,
    WebhookReconciler, WorkerMetricsPort,
};
use storesync_domain::{BreakerConfig, Config, JobName, Result, StoreSyncError};
use storesync_infra::database::{
    SqliteJobFailureRepository, SqliteOrderRepository, SqliteProductRepository,
    SqliteReportRepository, SqliteRequestRepository, SqliteScheduleRepository,
    SqliteSessionRepository, SqliteWebhookEventRepository,
};
use storesync_infra::{
    cache, DbManager, HealthProbe, JobWorker, JobWorkerConfig, PrometheusWorkerMetrics,
    RedisCacheJanitor, RedisWindowStore, ScheduleTicker, ScheduleTickerConfig,
    SqliteJobQueue, SqliteStoreRepository, WooClient,
};
use tracing::{info, instrument, warn};

use crate::server::ServerState;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Every long-lived component of the worker process
pub struct WorkerContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub metrics: Arc<PrometheusWorkerMetrics>,
    pub health: Arc<HealthProbe>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub catalog: Arc<RecurringCatalog>,
    ticker: ScheduleTicker,
    worker: JobWorker,
}

fn breaker_config(config: &BreakerConfig) -> Result<CircuitBreakerConfig> {
    CircuitBreakerConfig::builder()
        .failure_threshold(config.failure_threshold)
        .success_threshold(config.success_threshold)
        .cooldown(config.cooldown())
        .build()
        .map_err(|e| StoreSyncError::Config(format!("breaker: {e}")))
}

impl WorkerContext {
    /// Open storage and Redis, then build adapters, services and handlers.
    ///
    /// Nothing is started; call [`WorkerContext::start`].
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        info!(path = %config.database.path, "database ready");

        let redis = cache::connect(&config.redis, REDIS_CONNECT_TIMEOUT).await?;
        let window_store = Arc::new(RedisWindowStore::new(redis.clone(), config.redis.key_prefix.clone()));
        let limiter = SlidingWindowLimiter::new(window_store);
        let breakers = Arc::new(
            CircuitBreakerRegistry::new(breaker_config(&config.breaker)?)
                .map_err(|e| StoreSyncError::Config(format!("breaker registry: {e}")))?,
        );

        let metrics = Arc::new(
            PrometheusWorkerMetrics::new()
                .map_err(|e| StoreSyncError::Internal(format!("metrics registry: {e}")))?,
        );
        let metrics_port: Arc<dyn WorkerMetricsPort> = metrics.clone();

        // Repositories
        let stores = Arc::new(SqliteStoreRepository::new(db.clone()));
        let orders = Arc::new(SqliteOrderRepository::new(db.clone()));
        let products = Arc::new(SqliteProductRepository::new(db.clone()));
        let events = Arc::new(SqliteWebhookEventRepository::new(db.clone()));
        let requests = Arc::new(SqliteRequestRepository::new(db.clone()));
        let sessions = Arc::new(SqliteSessionRepository::new(db.clone()));
        let reports = Arc::new(SqliteReportRepository::new(db.clone()));
        let failures = Arc::new(SqliteJobFailureRepository::new(db.clone()));
        let schedules = Arc::new(SqliteScheduleRepository::new(db.clone()));
        let queue = Arc::new(SqliteJobQueue::new(
            db.clone(),
            clock.clone(),
            config.worker.queue_max_attempts,
        ));
        let queue_port: Arc<dyn JobQueue> = queue.clone();

        let upstream = Arc::new(WooClient::new(limiter.clone(), breakers.clone(), &config.sync)?);

        // Services
        let engine = Arc::new(SyncEngine::new(
            stores.clone(),
            orders.clone(),
            products.clone(),
            upstream,
            metrics_port.clone(),
            clock.clone(),
            SyncSettings::from(&config.sync),
        ));
        let reconciler = Arc::new(WebhookReconciler::new(
            events,
            stores.clone(),
            orders.clone(),
            products.clone(),
            clock.clone(),
            config.sync.webhook_batch_size,
        ));
        let catalog = Arc::new(RecurringCatalog::new(
            schedules,
            stores.clone(),
            queue_port.clone(),
            clock.clone(),
        ));

        let runtime = JobRuntime::new(
            failures,
            metrics_port,
            clock.clone(),
            RetryPolicy::from(&config.worker),
        )
        .with_handler(Arc::new(StoreSyncHandler::orders(engine.clone())))
        .with_handler(Arc::new(StoreSyncHandler::products(engine)))
        .with_handler(Arc::new(WebhookEventsHandler::new(reconciler)))
        .with_handler(Arc::new(WooScheduleHandler::new(catalog.clone())))
        .with_handler(Arc::new(CleanupCacheHandler::new(Arc::new(RedisCacheJanitor::new(redis)))))
        .with_handler(Arc::new(CleanupSessionsHandler::new(sessions, clock.clone())))
        .with_handler(Arc::new(GenerateReportHandler::new(reports, clock.clone())))
        .with_handler(Arc::new(ProcessRequestHandler::new(requests, products, orders, clock.clone())));
        info!(jobs = ?runtime.job_names(), "job handlers registered");

        let ticker = ScheduleTicker::new(
            ScheduleTickerConfig {
                cron_expression: config.worker.schedule_tick.clone(),
                ..ScheduleTickerConfig::default()
            },
            catalog.clone(),
        )
        .await?;

        let worker = JobWorker::new(
            queue_port,
            Arc::new(runtime),
            clock.clone(),
            JobWorkerConfig::from(&config.worker),
        );

        let health = Arc::new(HealthProbe::new(
            db.clone(),
            stores,
            queue,
            limiter,
            breakers.clone(),
            clock,
        ));

        Ok(Self { config, db, metrics, health, breakers, catalog, ticker, worker })
    }

    /// Register recurring schedules, queue the initial store pass, then start
    /// the ticker and the job pool
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        self.catalog.register_fixed().await?;
        let report = self.catalog.register_store_schedules().await?;
        info!(stores = report.stores, registered = report.registered, removed = report.removed, "store schedules registered");

        self.catalog.trigger(JobName::WooSchedule, json!({}), 5).await?;

        self.ticker.start().await?;
        self.worker.start()?;
        self.health.set_runtime_alive(true);
        info!("worker started");
        Ok(())
    }

    /// Stop taking work and wait for in-flight jobs.
    ///
    /// Errors are logged; shutdown always runs to the end.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) {
        self.health.set_runtime_alive(false);

        if let Err(err) = self.ticker.stop().await {
            warn!(error = %err, "schedule ticker did not stop cleanly");
        }
        if let Err(err) = self.worker.stop().await {
            warn!(error = %err, "job worker did not stop cleanly");
        }
        info!("worker stopped");
    }

    pub fn server_state(&self) -> ServerState {
        ServerState::new(self.health.clone(), self.metrics.clone())
    }
}
