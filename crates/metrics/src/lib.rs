//! Metrics and monitoring for the order execution engine
//!
//! # Features
//!
//! - Prometheus metrics for orders, jobs, quote sources and notifications
//! - HTTP endpoint for metrics scraping
//! - Tracing initialisation with env filter and optional JSON output
//! - Correlated spans for job runs
//!
//! # Example
//!
//! ```no_run
//! use order_engine_metrics::{MetricsCollector, MetricsServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = Arc::new(MetricsCollector::new());
//!     collector.record_order_submitted();
//!
//!     let server = MetricsServer::new(collector.clone(), "0.0.0.0:9090".to_string());
//!     server.serve().await.unwrap();
//! }
//! ```

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{MetricsCollector, MetricsError};
pub use http::{MetricsServer, MetricsServerError};
pub use tracing::{init_tracing, CorrelationId, JobSpan, TracingError};
