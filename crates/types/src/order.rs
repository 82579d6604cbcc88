use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::StageMetadata;

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Routing,
    Building,
    Submitted,
    Confirmed,
    Failed,
}

impl OrderStatus {
    /// Statuses of the success path, in order
    pub const SUCCESS_PATH: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Routing,
        OrderStatus::Building,
        OrderStatus::Submitted,
        OrderStatus::Confirmed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Next status on the success path, if any
    pub fn successor(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Routing),
            OrderStatus::Routing => Some(OrderStatus::Building),
            OrderStatus::Building => Some(OrderStatus::Submitted),
            OrderStatus::Submitted => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed | OrderStatus::Failed => None,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Any non-confirmed order may restart at `Pending`: that is the path a
    /// queue retry or a recovered lease takes.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return !self.is_terminal() || next == OrderStatus::Failed;
        }
        match (self, next) {
            (OrderStatus::Confirmed, _) => false,
            (_, OrderStatus::Pending) => true,
            (OrderStatus::Failed, _) => false,
            (_, OrderStatus::Failed) => true,
            (current, next) => current.successor() == Some(next),
        }
    }

    /// Human-readable status text sent to subscribers
    pub fn message(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order received and queued",
            OrderStatus::Routing => "Comparing DEX prices",
            OrderStatus::Building => "Creating transaction",
            OrderStatus::Submitted => "Transaction sent to network",
            OrderStatus::Confirmed => "Transaction successful",
            OrderStatus::Failed => "Order execution failed",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Routing => "routing",
            OrderStatus::Building => "building",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "routing" => Ok(OrderStatus::Routing),
            "building" => Ok(OrderStatus::Building),
            "submitted" => Ok(OrderStatus::Submitted),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("unknown order status: {0}")]
    UnknownStatus(String),

    #[error("invalid order: {reason}")]
    InvalidPayload { reason: String },

    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}

/// Minimal fields needed to run an order through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
}

impl OrderPayload {
    pub fn new(token_in: impl Into<String>, token_out: impl Into<String>, amount: Decimal) -> Self {
        Self {
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.token_in.trim().is_empty() || self.token_out.trim().is_empty() {
            return Err(OrderError::InvalidPayload {
                reason: "token symbols must not be empty".to_string(),
            });
        }
        if self.token_in == self.token_out {
            return Err(OrderError::InvalidPayload {
                reason: "tokenIn and tokenOut must differ".to_string(),
            });
        }
        if self.amount <= Decimal::ZERO {
            return Err(OrderError::InvalidPayload {
                reason: "Amount must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Persistent order record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub selected_route: Option<String>,
    pub executed_price: Option<Decimal>,
    pub settlement_ref: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<StageMetadata>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Order {
    pub fn new(id: impl Into<String>, payload: &OrderPayload, created_at: u64) -> Self {
        Self {
            id: id.into(),
            token_in: payload.token_in.clone(),
            token_out: payload.token_out.clone(),
            amount: payload.amount,
            status: OrderStatus::Pending,
            selected_route: None,
            executed_price: None,
            settlement_ref: None,
            error: None,
            metadata: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn payload(&self) -> OrderPayload {
        OrderPayload::new(&self.token_in, &self.token_out, self.amount)
    }

    /// Apply a change set in place. A restart at `Pending` drops everything
    /// the previous attempt wrote.
    pub fn apply(&mut self, changes: &OrderChanges, now: u64) {
        self.status = changes.status;
        if changes.status == OrderStatus::Pending {
            self.selected_route = None;
            self.metadata = None;
            self.error = None;
            self.executed_price = None;
            self.settlement_ref = None;
        }
        if let Some(route) = &changes.selected_route {
            self.selected_route = Some(route.clone());
        }
        if let Some(metadata) = &changes.metadata {
            self.metadata = Some(metadata.clone());
        }
        if let Some(error) = &changes.error {
            self.error = Some(error.clone());
        }
        if changes.status == OrderStatus::Confirmed {
            self.executed_price = changes.executed_price;
            self.settlement_ref = changes.settlement_ref.clone();
        }
        self.updated_at = now;
    }
}

/// Fields written by a single status transition
#[derive(Debug, Clone, PartialEq)]
pub struct OrderChanges {
    pub status: OrderStatus,
    pub selected_route: Option<String>,
    pub executed_price: Option<Decimal>,
    pub settlement_ref: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<StageMetadata>,
}

impl OrderChanges {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status,
            selected_route: None,
            executed_price: None,
            settlement_ref: None,
            error: None,
            metadata: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::status(OrderStatus::Failed).with_error(reason)
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.selected_route = Some(route.into());
        self
    }

    pub fn with_metadata(mut self, metadata: StageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Settlement fields; only honoured on the confirmed transition
    pub fn with_settlement(mut self, settlement_ref: impl Into<String>, executed_price: Decimal) -> Self {
        self.settlement_ref = Some(settlement_ref.into());
        self.executed_price = Some(executed_price);
        self
    }
}
