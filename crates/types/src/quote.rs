use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Priced quote returned by a quote source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Source identifier (e.g., "raydium")
    pub source: String,

    /// Output per unit of input, before fees
    pub price: Decimal,

    /// Fee fraction (0.003 = 0.3%)
    pub fee: Decimal,

    /// Expected output after fees
    pub estimated_output: Decimal,

    /// Retrieval time (Unix millis)
    pub timestamp: u64,
}

impl Quote {
    /// Build a quote deriving `estimated_output = amount * price * (1 - fee)`
    pub fn priced(
        source: impl Into<String>,
        amount: Decimal,
        price: Decimal,
        fee: Decimal,
        timestamp: u64,
    ) -> Self {
        Self {
            source: source.into(),
            price,
            fee,
            estimated_output: amount * price * (Decimal::ONE - fee),
            timestamp,
        }
    }
}

/// Execution request prepared by the building stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub order_id: String,
    pub route: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    pub quote: Quote,

    /// Lowest output the venue may settle for
    pub min_output: Decimal,
}

/// Result of a settled swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapReceipt {
    /// Venue settlement reference (transaction hash)
    pub settlement_ref: String,
    pub executed_price: Decimal,
    pub output_amount: Decimal,
    pub timestamp: u64,
}
