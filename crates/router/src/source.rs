use async_trait::async_trait;
use order_engine_types::{Quote, SwapReceipt, SwapRequest};
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuoteError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("quote timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported pair {token_in}/{token_out}")]
    UnsupportedPair { token_in: String, token_out: String },
}

impl QuoteError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteError::Unavailable(_) => "unavailable",
            QuoteError::Timeout(_) => "timeout",
            QuoteError::UnsupportedPair { .. } => "unsupported_pair",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SwapError {
    /// The venue refused the swap; retrying will not help
    #[error("swap rejected: {0}")]
    Rejected(String),

    /// The request never reached the venue
    #[error("venue unavailable: {0}")]
    Unavailable(String),

    /// The request was sent but no answer came back; the swap may have settled
    #[error("swap timed out: {0}")]
    Timeout(String),
}

/// A venue that can price and settle swaps
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Stable identifier, used as the route name
    fn id(&self) -> &str;

    /// Price `amount` of `token_in` in `token_out`
    async fn get_quote(&self, token_in: &str, token_out: &str, amount: Decimal) -> Result<Quote, QuoteError>;

    /// Settle a prepared swap
    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, SwapError>;

    async fn health_check(&self) -> bool {
        true
    }
}
