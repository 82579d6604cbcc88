//! Order execution engine
//!
//! Wires the order store, job queue, quote router, pipeline executor,
//! notification hub and worker pool into one `Engine`.
//!
//! ```ignore
//! let engine = Engine::from_config(&config).await?;
//! engine.start().await?;
//! let order = engine.submit(OrderPayload::new("SOL", "USDC", dec!(100))).await?;
//! ```

use order_engine_config::{validate_config, AppConfig, ConfigError};
use order_engine_metrics::MetricsCollector;
use order_engine_notify::{NotificationHub, SubscriptionId};
use order_engine_pipeline::{
    DefaultRequestBuilder, JobExecutor, PipelineError, PipelineExecutor, RequestBuilder,
};
use order_engine_queue::{
    EnqueueResult, InMemoryJobQueue, JobQueue, QueueError, QueueOptions, SqliteJobQueue,
};
use order_engine_ratelimit::ExponentialBackoff;
use order_engine_router::{QuoteRouter, QuoteSource, SimulatedVenue};
use order_engine_store::{InMemoryOrderStore, OrderStore, SqliteOrderStore, StoreError};
use order_engine_worker::{PoolError, WorkerPool, WorkerPoolConfig};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

pub use order_engine_queue::QueueCounts;
pub use order_engine_types::{
    current_timestamp_ms, Order, OrderChanges, OrderError, OrderEvent, OrderPayload, OrderStatus,
    StageMetadata,
};
pub use order_engine_worker::{PoolStats, StopReport};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is missing a {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("worker pool already running")]
    AlreadyStarted,
}

/// The order execution engine
pub struct Engine {
    store: Arc<dyn OrderStore>,
    queue: Arc<dyn JobQueue>,
    hub: Arc<NotificationHub>,
    router: Arc<QuoteRouter>,
    executor: Arc<PipelineExecutor>,
    pool_config: WorkerPoolConfig,
    pool: Mutex<Option<WorkerPool>>,
    channel_capacity: usize,
    metrics: MetricsCollector,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Build an engine with SQLite (or in-memory) backends and simulated venues
    pub async fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        validate_config(config)?;

        let queue_options = QueueOptions {
            max_attempts: config.queue.max_attempts,
            backoff: match config.queue.max_backoff() {
                Some(max) => ExponentialBackoff::new(config.queue.backoff()).with_max(max),
                None => ExponentialBackoff::new(config.queue.backoff()),
            },
            keep_completed: config.queue.keep_completed,
            keep_failed: config.queue.keep_failed,
            visibility_timeout: config.queue.visibility_timeout(),
            poll_interval: config.queue.poll_interval(),
        };

        let (store, queue): (Arc<dyn OrderStore>, Arc<dyn JobQueue>) = if config.database.in_memory {
            (
                Arc::new(InMemoryOrderStore::new()),
                Arc::new(InMemoryJobQueue::new(queue_options)),
            )
        } else {
            let path = &config.database.path;
            (
                Arc::new(SqliteOrderStore::new(path).await?),
                Arc::new(SqliteJobQueue::new(path, queue_options).await?),
            )
        };

        let (delay_min, delay_max) = config.router.mock_delay();
        let mut sources: Vec<Arc<dyn QuoteSource>> = Vec::with_capacity(config.router.venues.len());
        for venue in &config.router.venues {
            let venue = match venue.as_str() {
                "raydium" => SimulatedVenue::raydium(),
                "meteora" => SimulatedVenue::meteora(),
                other => {
                    return Err(ConfigError::ValidationError(format!("unknown venue '{other}'")).into())
                }
            };
            sources.push(Arc::new(venue.with_execution_latency(delay_min, delay_max)));
        }

        let slippage = Decimal::new(i64::from(config.router.slippage_tolerance_bps), 4);

        Engine::builder()
            .with_store(store)
            .with_queue(queue)
            .with_router(Arc::new(QuoteRouter::new(sources, config.router.quote_timeout())))
            .with_request_builder(Arc::new(DefaultRequestBuilder::new(slippage)))
            .with_pool_config(WorkerPoolConfig {
                concurrency: config.queue.concurrency,
                rate_limit: config.queue.rate_limit,
                rate_window: config.queue.rate_window(),
                reaper_interval: config.queue.reaper_interval(),
            })
            .with_channel_capacity(config.notifications.channel_capacity)
            .build()
    }

    /// Accept an order: persist it, then enqueue its job.
    ///
    /// The returned order is `pending`. If the queue cannot take the job the
    /// order is marked failed and the queue error is returned.
    pub async fn submit(&self, payload: OrderPayload) -> Result<Order, EngineError> {
        payload.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let order = Order::new(&id, &payload, order_engine_types::current_timestamp_ms());
        self.store.create_order(&order).await?;
        self.metrics.record_order_submitted();

        match self.queue.enqueue(&id, &payload).await {
            Ok(EnqueueResult::Accepted) => {
                info!(order_id = %id, token_in = %payload.token_in, token_out = %payload.token_out, amount = %payload.amount, "Order accepted");
            }
            Ok(EnqueueResult::AlreadyQueued) => {
                warn!(order_id = %id, "Order already queued");
            }
            Err(e) => {
                warn!(order_id = %id, error = %e, "Failed to enqueue order");
                let changes = OrderChanges::failed(format!("queue unavailable: {e}"));
                if let Err(store_error) = self.store.update_order(&id, &changes).await {
                    warn!(order_id = %id, error = %store_error, "Failed to mark unqueued order");
                }
                return Err(e.into());
            }
        }

        Ok(order)
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>, EngineError> {
        Ok(self.executor.get_order(id).await?)
    }

    /// Newest first
    pub async fn list_orders(&self, offset: usize, limit: usize) -> Result<Vec<Order>, EngineError> {
        Ok(self.executor.list_orders(offset, limit).await?)
    }

    /// Register a new subscriber channel for `order_id`, replacing any previous one
    pub async fn subscribe(&self, order_id: &str) -> (SubscriptionId, mpsc::Receiver<OrderEvent>) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let subscription = self.hub.subscribe(order_id, tx).await;
        (subscription, rx)
    }

    /// Drop the subscription if it is still the current one for `order_id`
    pub async fn release_subscription(&self, order_id: &str, subscription: SubscriptionId) {
        self.hub.release(order_id, subscription).await;
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub async fn queue_counts(&self) -> Result<QueueCounts, EngineError> {
        Ok(self.queue.counts().await?)
    }

    /// Health of every quote source
    pub async fn source_health(&self) -> Vec<(String, bool)> {
        self.router.health_check().await
    }

    /// `None` until `start` is called
    pub async fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.lock().await.as_ref().map(WorkerPool::stats)
    }

    /// Start processing queued orders
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let executor: Arc<dyn JobExecutor> = self.executor.clone();
        *pool = Some(WorkerPool::start(
            self.pool_config.clone(),
            self.queue.clone(),
            executor,
        )?);
        Ok(())
    }

    /// Stop the worker pool, waiting up to `timeout` for running jobs.
    ///
    /// Returns `None` if the pool was not running.
    pub async fn shutdown(&self, timeout: Duration) -> Option<StopReport> {
        let pool = self.pool.lock().await.take()?;
        Some(pool.stop(timeout).await)
    }
}

/// Assembles an `Engine` from its components
pub struct EngineBuilder {
    store: Option<Arc<dyn OrderStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    hub: Option<Arc<NotificationHub>>,
    router: Option<Arc<QuoteRouter>>,
    request_builder: Arc<dyn RequestBuilder>,
    pool_config: WorkerPoolConfig,
    channel_capacity: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            store: None,
            queue: None,
            hub: None,
            router: None,
            request_builder: Arc::new(DefaultRequestBuilder::default()),
            pool_config: WorkerPoolConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineBuilder {
    pub fn with_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Defaults to a fresh hub
    pub fn with_hub(mut self, hub: Arc<NotificationHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_router(mut self, router: Arc<QuoteRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_request_builder(mut self, builder: Arc<dyn RequestBuilder>) -> Self {
        self.request_builder = builder;
        self
    }

    pub fn with_pool_config(mut self, config: WorkerPoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Events buffered per subscriber
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let store = self.store.ok_or(EngineError::MissingField("store"))?;
        let queue = self.queue.ok_or(EngineError::MissingField("queue"))?;
        let router = self.router.ok_or(EngineError::MissingField("router"))?;
        let hub = self.hub.unwrap_or_default();
        self.pool_config.validate()?;

        let executor = Arc::new(PipelineExecutor::new(
            store.clone(),
            hub.clone(),
            router.clone(),
            self.request_builder,
        ));

        Ok(Engine {
            store,
            queue,
            hub,
            router,
            executor,
            pool_config: self.pool_config,
            pool: Mutex::new(None),
            channel_capacity: self.channel_capacity,
            metrics: MetricsCollector::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_engine_router::MockQuoteSource;
    use rust_decimal_macros::dec;

    fn router() -> Arc<QuoteRouter> {
        let source: Arc<dyn QuoteSource> = Arc::new(MockQuoteSource::new("meteora", dec!(1), dec!(0.002)));
        Arc::new(QuoteRouter::new(vec![source], Duration::from_secs(1)))
    }

    fn engine(queue: Arc<InMemoryJobQueue>) -> (Engine, Arc<InMemoryOrderStore>) {
        let store = Arc::new(InMemoryOrderStore::new());
        let engine = Engine::builder()
            .with_store(store.clone())
            .with_queue(queue)
            .with_router(router())
            .build()
            .unwrap();
        (engine, store)
    }

    #[test]
    fn test_build_requires_components() {
        let result = Engine::builder().with_router(router()).build();
        assert!(matches!(result, Err(EngineError::MissingField("store"))));

        let result = Engine::builder()
            .with_store(Arc::new(InMemoryOrderStore::new()))
            .with_router(router())
            .build();
        assert!(matches!(result, Err(EngineError::MissingField("queue"))));
    }

    #[tokio::test]
    async fn test_submit_persists_then_enqueues() {
        let queue = Arc::new(InMemoryJobQueue::default());
        let (engine, store) = engine(queue.clone());

        let order = engine
            .submit(OrderPayload::new("SOL", "USDC", dec!(100)))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(uuid::Uuid::parse_str(&order.id).is_ok());

        assert_eq!(store.get_order(&order.id).await.unwrap(), Some(order.clone()));
        assert!(queue.get(&order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_payload() {
        let queue = Arc::new(InMemoryJobQueue::default());
        let (engine, store) = engine(queue);

        let result = engine.submit(OrderPayload::new("SOL", "USDC", dec!(0))).await;
        assert!(matches!(result, Err(EngineError::InvalidOrder(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_queue_outage_fails_order() {
        let queue = Arc::new(InMemoryJobQueue::default());
        queue.set_available(false);
        let (engine, store) = engine(queue);

        let result = engine.submit(OrderPayload::new("SOL", "USDC", dec!(1))).await;
        assert!(matches!(result, Err(EngineError::Queue(QueueError::Unavailable(_)))));

        let orders = store.list_orders(0, 10).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert!(orders[0].error.as_deref().unwrap().starts_with("queue unavailable"));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (engine, _) = engine(Arc::new(InMemoryJobQueue::default()));
        engine.start().await.unwrap();
        assert!(matches!(engine.start().await, Err(EngineError::AlreadyStarted)));
        assert_eq!(engine.pool_stats().await, Some(PoolStats::default()));

        let report = engine.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(report.drained);
        assert!(engine.shutdown(Duration::from_secs(1)).await.is_none());
    }
}
