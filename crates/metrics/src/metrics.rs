use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total number of orders accepted for execution
    pub static ref ORDERS_SUBMITTED: IntCounter = register_int_counter!(
        "order_engine_orders_submitted_total",
        "Total number of orders submitted"
    )
    .unwrap();

    /// Order status transitions by target status
    pub static ref ORDER_STATUS_COUNT: IntCounterVec = register_int_counter_vec!(
        "order_engine_order_status_total",
        "Total order status transitions by status",
        &["status"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // JOB METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Finished job runs by outcome
    pub static ref JOBS_BY_OUTCOME: IntCounterVec = register_int_counter_vec!(
        "order_engine_jobs_total",
        "Total job runs by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Job run duration histogram (in milliseconds)
    pub static ref JOB_DURATION: Histogram = register_histogram!(
        "order_engine_job_duration_ms",
        "Job run duration in milliseconds",
        vec![100.0, 500.0, 1000.0, 2000.0, 3000.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap();

    /// Jobs currently executing
    pub static ref JOBS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "order_engine_jobs_in_flight",
        "Number of jobs currently executing"
    )
    .unwrap();

    /// Queue depth by job state
    pub static ref QUEUE_DEPTH: IntGaugeVec = register_int_gauge_vec!(
        "order_engine_queue_depth",
        "Number of jobs in the queue by state",
        &["state"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // ROUTING METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Quote latency per source
    pub static ref QUOTE_LATENCY_PER_SOURCE: HistogramVec = register_histogram_vec!(
        "order_engine_quote_latency_ms",
        "Quote latency per source in milliseconds",
        &["source"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0]
    )
    .unwrap();

    /// Failed quote requests per source
    pub static ref QUOTE_FAILURES: IntCounterVec = register_int_counter_vec!(
        "order_engine_quote_failures_total",
        "Total quote failures by source and reason",
        &["source", "reason"]
    )
    .unwrap();

    /// Routing decisions by selected source
    pub static ref ROUTE_SELECTIONS: IntCounterVec = register_int_counter_vec!(
        "order_engine_route_selections_total",
        "Total routing decisions by selected source",
        &["source"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // NOTIFICATION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Published events by delivery result
    pub static ref NOTIFICATIONS: IntCounterVec = register_int_counter_vec!(
        "order_engine_notifications_total",
        "Total published status events by delivery result",
        &["result"]
    )
    .unwrap();
}
