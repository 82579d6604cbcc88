use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderStatus, Quote};

/// Structured payload attached to a stage transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageMetadata {
    /// Recorded when routing has picked a venue
    Routing {
        selected_route: String,
        quotes: Vec<Quote>,
    },

    /// Recorded when the swap request is handed to the venue
    Submission {
        selected_route: String,
        estimated_price: Decimal,
        min_output: Decimal,
    },

    /// Recorded on confirmation
    Confirmation {
        settlement_ref: String,
        executed_price: Decimal,
        output_amount: Decimal,
        quotes: Vec<Quote>,
        executed_at: u64,
    },
}

impl StageMetadata {
    pub fn selected_route(&self) -> Option<&str> {
        match self {
            StageMetadata::Routing { selected_route, .. }
            | StageMetadata::Submission { selected_route, .. } => Some(selected_route),
            StageMetadata::Confirmation { .. } => None,
        }
    }
}

/// Status update delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<StageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: u64,
}

impl OrderEvent {
    pub fn new(order_id: impl Into<String>, status: OrderStatus, timestamp: u64) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            message: status.message().to_string(),
            data: None,
            error: None,
            timestamp,
        }
    }

    pub fn with_data(mut self, data: Option<StageMetadata>) -> Self {
        self.data = data;
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }
}
