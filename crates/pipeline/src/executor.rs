use async_trait::async_trait;
use order_engine_metrics::MetricsCollector;
use order_engine_notify::NotificationHub;
use order_engine_queue::{JobLease, JobOutcome};
use order_engine_router::{QuoteRouter, RouteError, SwapError};
use order_engine_store::{OrderStore, SettlementGuard};
use order_engine_types::{
    Order, OrderChanges, OrderEvent, OrderStatus, Quote, StageMetadata, SwapReceipt, SwapRequest,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::builder::RequestBuilder;
use crate::error::{classify, PipelineError};

/// Runs leased jobs on behalf of the worker pool
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one attempt and classify the result
    async fn run_job(&self, lease: &JobLease) -> JobOutcome;

    /// Called once the queue gives up on a job
    async fn mark_exhausted(&self, _order_id: &str, _reason: &str) {}
}

/// Drives a single order through every stage of execution
pub struct PipelineExecutor {
    store: Arc<dyn OrderStore>,
    hub: Arc<NotificationHub>,
    router: Arc<QuoteRouter>,
    builder: Arc<dyn RequestBuilder>,
    metrics: MetricsCollector,
}

impl PipelineExecutor {
    pub fn new(
        store: Arc<dyn OrderStore>,
        hub: Arc<NotificationHub>,
        router: Arc<QuoteRouter>,
        builder: Arc<dyn RequestBuilder>,
    ) -> Self {
        Self {
            store,
            hub,
            router,
            builder,
            metrics: MetricsCollector::new(),
        }
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>, PipelineError> {
        Ok(self.store.get_order(id).await?)
    }

    /// Newest first
    pub async fn list_orders(&self, offset: usize, limit: usize) -> Result<Vec<Order>, PipelineError> {
        Ok(self.store.list_orders(offset, limit).await?)
    }

    /// Run the order to a terminal state.
    ///
    /// On error the order is marked failed before the error is returned.
    pub async fn execute(&self, order_id: &str) -> Result<Order, PipelineError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| PipelineError::OrderNotFound(order_id.to_string()))?;

        if order.status == OrderStatus::Confirmed {
            info!(order_id = %order_id, "Order already confirmed, nothing to do");
            return Ok(order);
        }

        let result = match self.store.get_guard(order_id).await {
            Ok(None) => self.run_stages(order).await,
            Ok(Some(SettlementGuard::Executed { route, receipt })) => {
                self.resume_settled(order, route, receipt).await
            }
            Ok(Some(SettlementGuard::InFlight { route, started_at })) => {
                error!(
                    order_id = %order_id,
                    route = %route,
                    started_at,
                    "Previous settlement attempt has no recorded outcome"
                );
                Err(PipelineError::SettlementOutcomeUnknown { route })
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &result {
            warn!(order_id = %order_id, error = %e, retryable = e.is_retryable(), "Order execution failed");
            self.record_failure(order_id, e).await;
        }
        result
    }

    async fn run_stages(&self, order: Order) -> Result<Order, PipelineError> {
        let id = order.id.as_str();
        info!(order_id = %id, token_in = %order.token_in, token_out = %order.token_out, amount = %order.amount, "Starting order execution");

        self.transition(id, OrderChanges::status(OrderStatus::Pending)).await?;

        info!(order_id = %id, stage = ?OrderStatus::Routing, "Comparing quotes");
        self.transition(id, OrderChanges::status(OrderStatus::Routing)).await?;
        let decision = self
            .router
            .compare_and_route(&order.token_in, &order.token_out, order.amount)
            .await
            .map_err(|e| match e {
                RouteError::NoSources => PipelineError::NoRoute(e.to_string()),
                RouteError::NoRoute(failures) => PipelineError::NoRoute(
                    failures
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                ),
            })?;
        let route = decision.route().to_string();

        info!(order_id = %id, stage = ?OrderStatus::Building, route = %route, "Building swap");
        let order = self
            .transition(
                id,
                OrderChanges::status(OrderStatus::Building)
                    .with_route(&route)
                    .with_metadata(StageMetadata::Routing {
                        selected_route: route.clone(),
                        quotes: decision.quotes.clone(),
                    }),
            )
            .await?;
        let request = self.builder.build(&order, &decision).await?;

        info!(order_id = %id, stage = ?OrderStatus::Submitted, route = %route, min_output = %request.min_output, "Submitting swap");
        self.transition(
            id,
            OrderChanges::status(OrderStatus::Submitted)
                .with_route(&route)
                .with_metadata(StageMetadata::Submission {
                    selected_route: route.clone(),
                    estimated_price: request.quote.price,
                    min_output: request.min_output,
                }),
        )
        .await?;

        let receipt = self.settle(&request).await?;
        self.confirm(id, &route, receipt, decision.quotes).await
    }

    /// Call the venue under the settlement guard
    async fn settle(&self, request: &SwapRequest) -> Result<SwapReceipt, PipelineError> {
        let id = request.order_id.as_str();
        let route = request.route.clone();
        let source = self
            .router
            .source(&route)
            .ok_or_else(|| PipelineError::UnknownRoute(route.clone()))?;

        self.store.put_guard(id, &SettlementGuard::in_flight(&route)).await?;

        match source.execute_swap(request).await {
            Ok(receipt) => {
                let guard = SettlementGuard::Executed {
                    route: route.clone(),
                    receipt: receipt.clone(),
                };
                if let Err(e) = self.store.put_guard(id, &guard).await {
                    error!(order_id = %id, settlement_ref = %receipt.settlement_ref, error = %e, "Swap settled but receipt could not be recorded");
                    return Err(e.into());
                }
                Ok(receipt)
            }
            Err(SwapError::Timeout(reason)) => {
                // outcome unknown: the guard stays in flight
                Err(PipelineError::SettlementTimeout { route, reason })
            }
            Err(SwapError::Unavailable(reason)) => {
                self.clear_guard(id).await;
                Err(PipelineError::SettlementUnavailable { route, reason })
            }
            Err(SwapError::Rejected(reason)) => {
                self.clear_guard(id).await;
                Err(PipelineError::SettlementRejected { route, reason })
            }
        }
    }

    /// Finish an order whose swap already settled on a previous attempt
    async fn resume_settled(&self, order: Order, route: String, receipt: SwapReceipt) -> Result<Order, PipelineError> {
        let id = order.id.as_str();
        info!(order_id = %id, route = %route, settlement_ref = %receipt.settlement_ref, "Reusing recorded settlement");

        if order.status != OrderStatus::Submitted {
            self.transition(id, OrderChanges::status(OrderStatus::Pending)).await?;
            self.transition(id, OrderChanges::status(OrderStatus::Routing)).await?;
            self.transition(id, OrderChanges::status(OrderStatus::Building).with_route(&route))
                .await?;
            self.transition(id, OrderChanges::status(OrderStatus::Submitted).with_route(&route))
                .await?;
        }

        self.confirm(id, &route, receipt, Vec::new()).await
    }

    async fn confirm(&self, id: &str, route: &str, receipt: SwapReceipt, quotes: Vec<Quote>) -> Result<Order, PipelineError> {
        let order = self
            .transition(
                id,
                OrderChanges::status(OrderStatus::Confirmed)
                    .with_route(route)
                    .with_settlement(&receipt.settlement_ref, receipt.executed_price)
                    .with_metadata(StageMetadata::Confirmation {
                        settlement_ref: receipt.settlement_ref.clone(),
                        executed_price: receipt.executed_price,
                        output_amount: receipt.output_amount,
                        quotes,
                        executed_at: receipt.timestamp,
                    }),
            )
            .await?;

        info!(
            order_id = %id,
            route = %route,
            settlement_ref = %receipt.settlement_ref,
            executed_price = %receipt.executed_price,
            "Order confirmed"
        );
        Ok(order)
    }

    /// Persist, then publish
    async fn transition(&self, id: &str, changes: OrderChanges) -> Result<Order, PipelineError> {
        let order = self.store.update_order(id, &changes).await?;
        debug!(order_id = %id, stage = ?order.status, "Order transitioned");
        self.metrics.record_order_status(order.status);

        let event = OrderEvent::new(id, order.status, order.updated_at)
            .with_data(changes.metadata)
            .with_error(changes.error);
        self.hub.publish(id, event).await;
        Ok(order)
    }

    async fn record_failure(&self, id: &str, error: &PipelineError) {
        if matches!(error, PipelineError::OrderNotFound(_)) {
            return;
        }
        if let Err(e) = self.transition(id, OrderChanges::failed(error.to_string())).await {
            warn!(order_id = %id, error = %e, "Failed to record order failure");
        }
    }

    async fn clear_guard(&self, id: &str) {
        if let Err(e) = self.store.clear_guard(id).await {
            warn!(order_id = %id, error = %e, "Failed to clear settlement guard");
        }
    }
}

#[async_trait]
impl JobExecutor for PipelineExecutor {
    async fn run_job(&self, lease: &JobLease) -> JobOutcome {
        debug!(order_id = %lease.job_id, attempt = lease.attempt, "Running job");
        classify(&self.execute(&lease.job_id).await)
    }

    async fn mark_exhausted(&self, order_id: &str, reason: &str) {
        match self.store.get_order(order_id).await {
            Ok(Some(order)) if order.status == OrderStatus::Failed => {}
            Ok(Some(order)) if order.status == OrderStatus::Confirmed => {
                warn!(order_id = %order_id, "Exhausted job belongs to a confirmed order");
            }
            Ok(Some(_)) => {
                let changes = OrderChanges::failed(format!("retries exhausted: {reason}"));
                if let Err(e) = self.transition(order_id, changes).await {
                    warn!(order_id = %order_id, error = %e, "Failed to mark exhausted order");
                }
            }
            Ok(None) => warn!(order_id = %order_id, "Exhausted job has no order"),
            Err(e) => warn!(order_id = %order_id, error = %e, "Failed to load exhausted order"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefaultRequestBuilder;
    use order_engine_router::{MockQuoteSource, QuoteSource};
    use order_engine_store::InMemoryOrderStore;
    use order_engine_types::OrderPayload;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        store: Arc<InMemoryOrderStore>,
        hub: Arc<NotificationHub>,
        executor: PipelineExecutor,
    }

    fn harness(sources: Vec<Arc<MockQuoteSource>>) -> Harness {
        let store = Arc::new(InMemoryOrderStore::new());
        let hub = Arc::new(NotificationHub::new());
        let sources = sources
            .into_iter()
            .map(|s| s as Arc<dyn QuoteSource>)
            .collect();
        let router = Arc::new(QuoteRouter::new(sources, Duration::from_secs(1)));
        let executor = PipelineExecutor::new(
            store.clone(),
            hub.clone(),
            router,
            Arc::new(DefaultRequestBuilder::default()),
        );
        Harness { store, hub, executor }
    }

    async fn create(store: &InMemoryOrderStore, id: &str) {
        let order = Order::new(id, &OrderPayload::new("SOL", "USDC", dec!(100)), 1);
        store.create_order(&order).await.unwrap();
    }

    fn drain(rx: &mut mpsc::Receiver<OrderEvent>) -> Vec<OrderEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_best_quote_is_confirmed() {
        let raydium = Arc::new(MockQuoteSource::new("raydium", dec!(1.0), dec!(0.003)));
        let meteora = Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)));
        let h = harness(vec![raydium.clone(), meteora.clone()]);
        create(&h.store, "order-1").await;

        let (tx, mut rx) = mpsc::channel(16);
        h.hub.subscribe("order-1", tx).await;

        let order = h.executor.execute("order-1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.selected_route.as_deref(), Some("meteora"));
        assert_eq!(order.settlement_ref.as_deref(), Some("meteora-tx-1"));
        assert_eq!(order.executed_price, Some(dec!(1.0)));
        assert_eq!(raydium.swap_calls(), 0);
        assert_eq!(meteora.swap_calls(), 1);

        let statuses: Vec<_> = drain(&mut rx).into_iter().map(|e| e.status).collect();
        assert_eq!(statuses, OrderStatus::SUCCESS_PATH.to_vec());

        let stored = h.store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(stored, order);
        match stored.metadata {
            Some(StageMetadata::Confirmation { output_amount, quotes, .. }) => {
                assert_eq!(output_amount, dec!(99.8));
                assert_eq!(quotes.len(), 2);
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_carry_stage_metadata() {
        let h = harness(vec![Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)))]);
        create(&h.store, "order-1").await;
        let (tx, mut rx) = mpsc::channel(16);
        h.hub.subscribe("order-1", tx).await;

        h.executor.execute("order-1").await.unwrap();
        let events = drain(&mut rx);

        assert!(events[0].data.is_none());
        assert!(matches!(events[2].data, Some(StageMetadata::Routing { .. })));
        match &events[3].data {
            Some(StageMetadata::Submission { min_output, .. }) => {
                assert_eq!(*min_output, dec!(99.8) * dec!(0.99));
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
        assert_eq!(events[4].message, "Transaction successful");
    }

    #[tokio::test]
    async fn test_no_route_is_fatal() {
        let h = harness(vec![
            Arc::new(MockQuoteSource::new("raydium", dec!(1.0), dec!(0.003)).failing_quotes("rpc down")),
            Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)).failing_quotes("maintenance")),
        ]);
        create(&h.store, "order-1").await;
        let (tx, mut rx) = mpsc::channel(16);
        h.hub.subscribe("order-1", tx).await;

        let result = h.executor.execute("order-1").await;
        assert!(matches!(result, Err(PipelineError::NoRoute(_))));
        assert!(matches!(classify(&result), JobOutcome::FatalFailure(_)));

        let order = h.store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        let error = order.error.unwrap();
        assert!(error.contains("rpc down") && error.contains("maintenance"));

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.status, OrderStatus::Failed);
        assert_eq!(last.error.as_deref(), Some(error.as_str()));
    }

    #[tokio::test]
    async fn test_unavailable_venue_is_retryable_and_clears_guard() {
        let venue = Arc::new(
            MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002))
                .with_swap_results(vec![Err(SwapError::Unavailable("rpc down".to_string()))]),
        );
        let h = harness(vec![venue.clone()]);
        create(&h.store, "order-1").await;

        let result = h.executor.execute("order-1").await;
        assert!(matches!(classify(&result), JobOutcome::RetryableFailure(_)));
        assert!(h.store.get_guard("order-1").await.unwrap().is_none());
        assert_eq!(
            h.store.get_order("order-1").await.unwrap().unwrap().status,
            OrderStatus::Failed
        );

        // the next attempt restarts from pending and settles
        let order = h.executor.execute("order-1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(venue.swap_calls(), 2);
    }

    /// Keeps every order snapshot the store hands back
    struct SnapshotStore {
        inner: InMemoryOrderStore,
        updates: std::sync::Mutex<Vec<Order>>,
    }

    impl SnapshotStore {
        fn new() -> Self {
            Self {
                inner: InMemoryOrderStore::new(),
                updates: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn updates(&self) -> Vec<Order> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderStore for SnapshotStore {
        async fn create_order(&self, order: &Order) -> Result<(), order_engine_store::StoreError> {
            self.inner.create_order(order).await
        }

        async fn update_order(
            &self,
            id: &str,
            changes: &OrderChanges,
        ) -> Result<Order, order_engine_store::StoreError> {
            let order = self.inner.update_order(id, changes).await?;
            self.updates.lock().unwrap().push(order.clone());
            Ok(order)
        }

        async fn get_order(&self, id: &str) -> Result<Option<Order>, order_engine_store::StoreError> {
            self.inner.get_order(id).await
        }

        async fn list_orders(
            &self,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<Order>, order_engine_store::StoreError> {
            self.inner.list_orders(offset, limit).await
        }

        async fn get_guard(
            &self,
            order_id: &str,
        ) -> Result<Option<SettlementGuard>, order_engine_store::StoreError> {
            self.inner.get_guard(order_id).await
        }

        async fn put_guard(
            &self,
            order_id: &str,
            guard: &SettlementGuard,
        ) -> Result<(), order_engine_store::StoreError> {
            self.inner.put_guard(order_id, guard).await
        }

        async fn clear_guard(&self, order_id: &str) -> Result<(), order_engine_store::StoreError> {
            self.inner.clear_guard(order_id).await
        }
    }

    #[tokio::test]
    async fn test_retry_starts_without_previous_route() {
        let raydium = Arc::new(MockQuoteSource::new("raydium", dec!(1.0), dec!(0.003)));
        let meteora = Arc::new(
            MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002))
                .with_swap_results(vec![Err(SwapError::Unavailable("rpc down".to_string()))]),
        );
        let store = Arc::new(SnapshotStore::new());
        let router = Arc::new(QuoteRouter::new(
            vec![raydium as Arc<dyn QuoteSource>, meteora as Arc<dyn QuoteSource>],
            Duration::from_secs(1),
        ));
        let executor = PipelineExecutor::new(
            store.clone(),
            Arc::new(NotificationHub::new()),
            router,
            Arc::new(DefaultRequestBuilder::default()),
        );
        let order = Order::new("order-1", &OrderPayload::new("SOL", "USDC", dec!(100)), 1);
        store.create_order(&order).await.unwrap();

        assert!(executor.execute("order-1").await.is_err());
        let failed = store.updates().last().cloned().unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.selected_route.as_deref(), Some("meteora"));

        let first_attempt = store.updates().len();
        let confirmed = executor.execute("order-1").await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let retry = store.updates().split_off(first_attempt);
        let statuses: Vec<_> = retry.iter().map(|o| o.status).collect();
        assert_eq!(statuses, OrderStatus::SUCCESS_PATH.to_vec());
        for snapshot in &retry[..2] {
            assert_eq!(snapshot.selected_route, None, "{}", snapshot.status);
            assert_eq!(snapshot.metadata, None, "{}", snapshot.status);
            assert_eq!(snapshot.error, None, "{}", snapshot.status);
        }
        assert!(matches!(retry[2].metadata, Some(StageMetadata::Routing { .. })));
    }

    #[tokio::test]
    async fn test_rejected_swap_is_fatal() {
        let h = harness(vec![Arc::new(
            MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002))
                .with_swap_results(vec![Err(SwapError::Rejected("slippage".to_string()))]),
        )]);
        create(&h.store, "order-1").await;

        let result = h.executor.execute("order-1").await;
        assert!(matches!(result, Err(PipelineError::SettlementRejected { .. })));
        assert!(matches!(classify(&result), JobOutcome::FatalFailure(_)));
        assert!(h.store.get_guard("order-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_fatal_and_blocks_second_call() {
        let venue = Arc::new(
            MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002))
                .with_swap_results(vec![Err(SwapError::Timeout("no answer".to_string()))]),
        );
        let h = harness(vec![venue.clone()]);
        create(&h.store, "order-1").await;

        let first = h.executor.execute("order-1").await;
        assert!(matches!(first, Err(PipelineError::SettlementTimeout { .. })));
        assert!(matches!(classify(&first), JobOutcome::FatalFailure(_)));
        assert!(matches!(
            h.store.get_guard("order-1").await.unwrap(),
            Some(SettlementGuard::InFlight { .. })
        ));
        let order = h.store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert!(order.error.unwrap().contains("manual reconciliation"));

        // a manual re-enqueue still never calls the venue twice
        let second = h.executor.execute("order-1").await;
        assert!(matches!(second, Err(PipelineError::SettlementOutcomeUnknown { .. })));
        assert!(matches!(classify(&second), JobOutcome::FatalFailure(_)));
        assert_eq!(venue.swap_calls(), 1);

        let order = h.store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert!(order.error.unwrap().contains("manual reconciliation"));
    }

    #[tokio::test]
    async fn test_recorded_receipt_is_reused() {
        let venue = Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)));
        let h = harness(vec![venue.clone()]);
        create(&h.store, "order-1").await;

        let receipt = SwapReceipt {
            settlement_ref: "earlier-settlement".to_string(),
            executed_price: dec!(1.001),
            output_amount: dec!(99.9),
            timestamp: 5,
        };
        h.store
            .put_guard(
                "order-1",
                &SettlementGuard::Executed {
                    route: "meteora".to_string(),
                    receipt,
                },
            )
            .await
            .unwrap();

        let order = h.executor.execute("order-1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.settlement_ref.as_deref(), Some("earlier-settlement"));
        assert_eq!(order.executed_price, Some(dec!(1.001)));
        assert_eq!(venue.swap_calls(), 0);
        assert_eq!(venue.quote_calls(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_order_is_noop() {
        let venue = Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)));
        let h = harness(vec![venue.clone()]);
        create(&h.store, "order-1").await;

        h.executor.execute("order-1").await.unwrap();
        let again = h.executor.execute("order-1").await.unwrap();

        assert_eq!(again.status, OrderStatus::Confirmed);
        assert_eq!(venue.swap_calls(), 1);
        assert_eq!(venue.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let h = harness(vec![Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)))]);
        let result = h.executor.execute("missing").await;
        assert!(matches!(result, Err(PipelineError::OrderNotFound(_))));
        assert!(matches!(classify(&result), JobOutcome::FatalFailure(_)));
    }

    #[tokio::test]
    async fn test_mark_exhausted_fails_order() {
        let h = harness(vec![Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)))]);
        create(&h.store, "order-1").await;
        h.store
            .update_order("order-1", &OrderChanges::status(OrderStatus::Routing))
            .await
            .unwrap();

        h.executor.mark_exhausted("order-1", "venue unavailable").await;

        let order = h.store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error.as_deref(), Some("retries exhausted: venue unavailable"));
    }

    #[tokio::test]
    async fn test_run_job_classifies() {
        let h = harness(vec![Arc::new(MockQuoteSource::new("meteora", dec!(1.0), dec!(0.002)))]);
        create(&h.store, "order-1").await;
        let lease = JobLease {
            job_id: "order-1".to_string(),
            token: "token".to_string(),
            worker_id: "worker-0".to_string(),
            attempt: 1,
            payload: OrderPayload::new("SOL", "USDC", dec!(100)),
            expires_at: u64::MAX,
        };

        assert_eq!(h.executor.run_job(&lease).await, JobOutcome::Success);
        assert_eq!(h.executor.list_orders(0, 10).await.unwrap().len(), 1);
        assert!(h.executor.get_order("order-1").await.unwrap().is_some());
    }
}
