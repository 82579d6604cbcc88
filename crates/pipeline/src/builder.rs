use async_trait::async_trait;
use order_engine_router::RouteDecision;
use order_engine_types::{Order, SwapRequest};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("slippage tolerance must be in [0, 1), got {0}")]
    InvalidSlippage(Decimal),

    #[error("quote from {route} has no positive output")]
    EmptyQuote { route: String },
}

/// Prepares the swap request for the selected route
#[async_trait]
pub trait RequestBuilder: Send + Sync {
    async fn build(&self, order: &Order, decision: &RouteDecision) -> Result<SwapRequest, BuildError>;
}

/// Derives `min_output` from the selected quote and a slippage tolerance
#[derive(Debug, Clone)]
pub struct DefaultRequestBuilder {
    slippage_tolerance: Decimal,
}

impl DefaultRequestBuilder {
    pub const DEFAULT_SLIPPAGE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

    pub fn new(slippage_tolerance: Decimal) -> Self {
        Self { slippage_tolerance }
    }

    pub fn slippage_tolerance(&self) -> Decimal {
        self.slippage_tolerance
    }
}

impl Default for DefaultRequestBuilder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLIPPAGE)
    }
}

#[async_trait]
impl RequestBuilder for DefaultRequestBuilder {
    async fn build(&self, order: &Order, decision: &RouteDecision) -> Result<SwapRequest, BuildError> {
        if self.slippage_tolerance < Decimal::ZERO || self.slippage_tolerance >= Decimal::ONE {
            return Err(BuildError::InvalidSlippage(self.slippage_tolerance));
        }

        let quote = &decision.selected;
        if quote.estimated_output <= Decimal::ZERO {
            return Err(BuildError::EmptyQuote {
                route: quote.source.clone(),
            });
        }

        Ok(SwapRequest {
            order_id: order.id.clone(),
            route: quote.source.clone(),
            token_in: order.token_in.clone(),
            token_out: order.token_out.clone(),
            amount: order.amount,
            quote: quote.clone(),
            min_output: quote.estimated_output * (Decimal::ONE - self.slippage_tolerance),
        })
    }
}
