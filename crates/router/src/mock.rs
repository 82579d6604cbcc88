use async_trait::async_trait;
use order_engine_types::{current_timestamp_ms, Quote, SwapReceipt, SwapRequest};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::source::{QuoteError, QuoteSource, SwapError};

/// Scripted quote source with a fixed price (for testing)
pub struct MockQuoteSource {
    id: String,
    price: Decimal,
    fee: Decimal,
    quote_error: Option<String>,
    quote_latency: Duration,
    swap_latency: Duration,
    swap_script: Mutex<VecDeque<Result<(), SwapError>>>,
    healthy: bool,
    quote_calls: AtomicUsize,
    swap_calls: AtomicUsize,
}

impl MockQuoteSource {
    pub fn new(id: impl Into<String>, price: Decimal, fee: Decimal) -> Self {
        Self {
            id: id.into(),
            price,
            fee,
            quote_error: None,
            quote_latency: Duration::ZERO,
            swap_latency: Duration::ZERO,
            swap_script: Mutex::new(VecDeque::new()),
            healthy: true,
            quote_calls: AtomicUsize::new(0),
            swap_calls: AtomicUsize::new(0),
        }
    }

    /// Every quote request fails with `reason`
    pub fn failing_quotes(mut self, reason: impl Into<String>) -> Self {
        self.quote_error = Some(reason.into());
        self
    }

    pub fn with_quote_latency(mut self, latency: Duration) -> Self {
        self.quote_latency = latency;
        self
    }

    pub fn with_swap_latency(mut self, latency: Duration) -> Self {
        self.swap_latency = latency;
        self
    }

    /// Outcomes for successive swaps; once exhausted every swap succeeds
    pub fn with_swap_results(self, results: Vec<Result<(), SwapError>>) -> Self {
        if let Ok(mut script) = self.swap_script.lock() {
            script.extend(results);
        }
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn swap_calls(&self) -> usize {
        self.swap_calls.load(Ordering::SeqCst)
    }

    fn next_swap_result(&self) -> Result<(), SwapError> {
        self.swap_script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(Ok(()))
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_quote(&self, _token_in: &str, _token_out: &str, amount: Decimal) -> Result<Quote, QuoteError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if !self.quote_latency.is_zero() {
            tokio::time::sleep(self.quote_latency).await;
        }

        match &self.quote_error {
            Some(reason) => Err(QuoteError::Unavailable(reason.clone())),
            None => Ok(Quote::priced(
                &self.id,
                amount,
                self.price,
                self.fee,
                current_timestamp_ms(),
            )),
        }
    }

    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, SwapError> {
        let call = self.swap_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.swap_latency.is_zero() {
            tokio::time::sleep(self.swap_latency).await;
        }

        self.next_swap_result()?;

        let output_amount = request.amount * request.quote.price * (Decimal::ONE - request.quote.fee);
        if output_amount < request.min_output {
            return Err(SwapError::Rejected(format!(
                "output {output_amount} below minimum {}",
                request.min_output
            )));
        }

        Ok(SwapReceipt {
            settlement_ref: format!("{}-tx-{call}", self.id),
            executed_price: request.quote.price,
            output_amount,
            timestamp: current_timestamp_ms(),
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}
