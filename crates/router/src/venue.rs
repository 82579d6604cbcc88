use async_trait::async_trait;
use order_engine_types::{current_timestamp_ms, Quote, SwapReceipt, SwapRequest};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::{debug, info};

use crate::source::{QuoteError, QuoteSource, SwapError};

const SETTLEMENT_REF_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SETTLEMENT_REF_LEN: usize = 88;

/// Behaviour of a simulated venue
#[derive(Debug, Clone, PartialEq)]
pub struct VenueConfig {
    pub id: String,
    pub base_price: Decimal,

    /// Quoted price is `base_price` times a factor drawn from this band
    pub price_band: (Decimal, Decimal),

    pub fee: Decimal,
    pub quote_latency: Duration,
    pub execution_latency: (Duration, Duration),

    /// Executed price drifts from the quote by a fraction drawn from this band
    pub slippage_band: (Decimal, Decimal),
}

/// DEX stand-in with randomised prices and settlement delay
#[derive(Debug, Clone)]
pub struct SimulatedVenue {
    config: VenueConfig,
}

impl SimulatedVenue {
    pub fn new(config: VenueConfig) -> Self {
        Self { config }
    }

    /// 98-102% of base price, 0.3% fee
    pub fn raydium() -> Self {
        Self::new(VenueConfig {
            id: "raydium".to_string(),
            base_price: Decimal::ONE,
            price_band: (dec!(0.98), dec!(1.02)),
            fee: dec!(0.003),
            quote_latency: Duration::from_millis(200),
            execution_latency: (Duration::from_millis(2000), Duration::from_millis(3000)),
            slippage_band: (dec!(-0.005), dec!(0.005)),
        })
    }

    /// 97-102% of base price, 0.2% fee
    pub fn meteora() -> Self {
        Self::new(VenueConfig {
            id: "meteora".to_string(),
            base_price: Decimal::ONE,
            price_band: (dec!(0.97), dec!(1.02)),
            fee: dec!(0.002),
            quote_latency: Duration::from_millis(200),
            execution_latency: (Duration::from_millis(2000), Duration::from_millis(3000)),
            slippage_band: (dec!(-0.005), dec!(0.005)),
        })
    }

    pub fn with_execution_latency(mut self, min: Duration, max: Duration) -> Self {
        self.config.execution_latency = (min, max);
        self
    }

    pub fn with_quote_latency(mut self, latency: Duration) -> Self {
        self.config.quote_latency = latency;
        self
    }

    pub fn config(&self) -> &VenueConfig {
        &self.config
    }
}

fn random_in(min: Decimal, max: Decimal) -> Decimal {
    if max <= min {
        return min;
    }
    let t = Decimal::from_f64(rand::thread_rng().gen::<f64>()).unwrap_or(Decimal::ZERO);
    (min + (max - min) * t).round_dp(6)
}

fn random_duration(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

fn settlement_ref() -> String {
    let mut rng = rand::thread_rng();
    (0..SETTLEMENT_REF_LEN)
        .map(|_| SETTLEMENT_REF_CHARS[rng.gen_range(0..SETTLEMENT_REF_CHARS.len())] as char)
        .collect()
}

#[async_trait]
impl QuoteSource for SimulatedVenue {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn get_quote(&self, token_in: &str, token_out: &str, amount: Decimal) -> Result<Quote, QuoteError> {
        tokio::time::sleep(self.config.quote_latency).await;

        let (low, high) = self.config.price_band;
        let price = self.config.base_price * random_in(low, high);
        let quote = Quote::priced(&self.config.id, amount, price, self.config.fee, current_timestamp_ms());

        debug!(
            venue = %self.config.id,
            token_in = %token_in,
            token_out = %token_out,
            price = %quote.price,
            estimated_output = %quote.estimated_output,
            "Quote"
        );
        Ok(quote)
    }

    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, SwapError> {
        let (min, max) = self.config.execution_latency;
        let delay = random_duration(min, max);
        let (low, high) = self.config.slippage_band;
        let slippage = random_in(low, high);

        tokio::time::sleep(delay).await;

        let executed_price = request.quote.price * (Decimal::ONE + slippage);
        let output_amount = request.amount * executed_price * (Decimal::ONE - request.quote.fee);
        if output_amount < request.min_output {
            return Err(SwapError::Rejected(format!(
                "output {output_amount} below minimum {}",
                request.min_output
            )));
        }

        let receipt = SwapReceipt {
            settlement_ref: settlement_ref(),
            executed_price,
            output_amount,
            timestamp: current_timestamp_ms(),
        };

        info!(
            venue = %self.config.id,
            order_id = %request.order_id,
            settlement_ref = %receipt.settlement_ref,
            "Swap executed"
        );
        Ok(receipt)
    }
}
