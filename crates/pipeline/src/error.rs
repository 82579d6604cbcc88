use order_engine_queue::JobOutcome;
use order_engine_store::StoreError;
use order_engine_types::Order;
use thiserror::Error;

use crate::builder::BuildError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("no route available: {0}")]
    NoRoute(String),

    #[error("failed to build swap: {0}")]
    Build(#[from] BuildError),

    #[error("settlement rejected by {route}: {reason}")]
    SettlementRejected { route: String, reason: String },

    #[error("settlement venue {route} unavailable: {reason}")]
    SettlementUnavailable { route: String, reason: String },

    #[error("settlement on {route} timed out ({reason}), outcome unknown, manual reconciliation required")]
    SettlementTimeout { route: String, reason: String },

    #[error("settlement outcome on {route} unknown, manual reconciliation required")]
    SettlementOutcomeUnknown { route: String },

    #[error("route {0} has no settlement source")]
    UnknownRoute(String),
}

impl PipelineError {
    /// Whether another attempt may succeed.
    ///
    /// A settlement timeout is not: the swap may have executed, and a rerun
    /// could only stop at the in-flight guard.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Store(e) => e.is_transient(),
            PipelineError::SettlementUnavailable { .. } => true,
            _ => false,
        }
    }
}

/// Map a pipeline run to the outcome reported to the queue
pub fn classify(result: &Result<Order, PipelineError>) -> JobOutcome {
    match result {
        Ok(_) => JobOutcome::Success,
        Err(e) if e.is_retryable() => JobOutcome::RetryableFailure(e.to_string()),
        Err(e) => JobOutcome::FatalFailure(e.to_string()),
    }
}
