use std::time::Duration;

use order_engine_types::OrderStatus;
use prometheus::{Encoder, TextEncoder};

use crate::metrics::*;

/// Metrics collector for the order execution engine.
///
/// Metrics live in the default prometheus registry, so every collector handle
/// records into the same set.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_order_submitted(&self) {
        ORDERS_SUBMITTED.inc();
    }

    /// Record an order entering `status`
    pub fn record_order_status(&self, status: OrderStatus) {
        ORDER_STATUS_COUNT.with_label_values(&[status.as_str()]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // JOB METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_job_started(&self) {
        JOBS_IN_FLIGHT.inc();
    }

    /// Record a finished job run; `outcome` is a short label such as "completed"
    pub fn record_job_finished(&self, outcome: &str, duration: Duration) {
        JOBS_IN_FLIGHT.dec();
        JOBS_BY_OUTCOME.with_label_values(&[outcome]).inc();
        JOB_DURATION.observe(duration.as_millis() as f64);
    }

    pub fn set_queue_depth(&self, state: &str, depth: usize) {
        QUEUE_DEPTH.with_label_values(&[state]).set(depth as i64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROUTING METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_quote(&self, source: &str, latency: Duration) {
        QUOTE_LATENCY_PER_SOURCE
            .with_label_values(&[source])
            .observe(latency.as_millis() as f64);
    }

    pub fn record_quote_failure(&self, source: &str, reason: &str) {
        QUOTE_FAILURES.with_label_values(&[source, reason]).inc();
    }

    pub fn record_route_selected(&self, source: &str) {
        ROUTE_SELECTIONS.with_label_values(&[source]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NOTIFICATION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_notification(&self, result: &str) {
        NOTIFICATIONS.with_label_values(&[result]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Render all metrics in the Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        assert!(collector.export_metrics().is_ok());
    }

    #[test]
    fn test_record_order_metrics() {
        let collector = MetricsCollector::new();

        collector.record_order_submitted();
        collector.record_order_status(OrderStatus::Routing);
        collector.record_order_status(OrderStatus::Confirmed);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_engine_orders_submitted_total"));
        assert!(metrics.contains("order_engine_order_status_total{status=\"confirmed\"}"));
    }

    #[test]
    fn test_record_job_metrics() {
        let collector = MetricsCollector::new();

        collector.record_job_started();
        collector.record_job_finished("completed", Duration::from_millis(2500));
        collector.set_queue_depth("waiting", 4);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_engine_jobs_total{outcome=\"completed\"}"));
        assert!(metrics.contains("order_engine_job_duration_ms"));
        assert!(metrics.contains("order_engine_jobs_in_flight"));
        assert!(metrics.contains("order_engine_queue_depth{state=\"waiting\"} 4"));
    }

    #[test]
    fn test_record_routing_and_notification_metrics() {
        let collector = MetricsCollector::new();

        collector.record_quote("raydium", Duration::from_millis(200));
        collector.record_quote_failure("meteora", "timeout");
        collector.record_route_selected("raydium");
        collector.record_notification("dropped");

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_engine_quote_latency_ms"));
        assert!(metrics.contains("order_engine_quote_failures_total"));
        assert!(metrics.contains("order_engine_route_selections_total{source=\"raydium\"}"));
        assert!(metrics.contains("order_engine_notifications_total{result=\"dropped\"}"));
    }
}
