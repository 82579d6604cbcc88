use async_trait::async_trait;
use order_engine_types::{current_timestamp_ms, Order, OrderChanges, OrderError, SwapReceipt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

// ═══════════════════════════════════════════════════════════════════════════
// CORE TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Persisted record of a venue call for one order.
///
/// Written before the venue is called and again once a receipt is in hand, so
/// a re-run of the same order never issues a second settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SettlementGuard {
    /// Venue call issued, outcome not yet recorded
    InFlight { route: String, started_at: u64 },

    /// Venue call settled
    Executed { route: String, receipt: SwapReceipt },
}

impl SettlementGuard {
    pub fn in_flight(route: impl Into<String>) -> Self {
        SettlementGuard::InFlight {
            route: route.into(),
            started_at: current_timestamp_ms(),
        }
    }

    pub fn route(&self) -> &str {
        match self {
            SettlementGuard::InFlight { route, .. } | SettlementGuard::Executed { route, .. } => route,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("duplicate order ID: {0}")]
    DuplicateId(String),

    #[error(transparent)]
    Transition(#[from] OrderError),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

impl StoreError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::DatabaseError(_) | StoreError::ConnectionError(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Order storage trait - can be implemented for different backends
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store a new order
    async fn create_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Apply a status transition and return the updated order.
    ///
    /// Rejects transitions the order lifecycle does not allow.
    async fn update_order(&self, id: &str, changes: &OrderChanges) -> Result<Order, StoreError>;

    /// Get order by ID
    async fn get_order(&self, id: &str) -> Result<Option<Order>, StoreError>;

    /// Page through orders, newest first
    async fn list_orders(&self, offset: usize, limit: usize) -> Result<Vec<Order>, StoreError>;

    /// Settlement guard for an order, if any
    async fn get_guard(&self, order_id: &str) -> Result<Option<SettlementGuard>, StoreError>;

    /// Insert or replace the settlement guard
    async fn put_guard(&self, order_id: &str, guard: &SettlementGuard) -> Result<(), StoreError>;

    /// Remove the settlement guard; no-op if absent
    async fn clear_guard(&self, order_id: &str) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE (for testing)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<String, (u64, Order)>,
    guards: HashMap<String, SettlementGuard>,
    next_seq: u64,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of orders (for testing)
    pub async fn len(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Check if store is empty (for testing)
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateId(order.id.clone()));
        }
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.orders.insert(order.id.clone(), (seq, order.clone()));
        Ok(())
    }

    async fn update_order(&self, id: &str, changes: &OrderChanges) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let (_, order) = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !order.status.can_transition_to(changes.status) {
            return Err(OrderError::IllegalTransition {
                from: order.status,
                to: changes.status,
            }
            .into());
        }

        order.apply(changes, current_timestamp_ms());
        Ok(order.clone())
    }

    async fn get_order(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(id).map(|(_, order)| order.clone()))
    }

    async fn list_orders(&self, offset: usize, limit: usize) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<&(u64, Order)> = tables.orders.values().collect();
        orders.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(&a.0))
        });

        Ok(orders
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, order)| order.clone())
            .collect())
    }

    async fn get_guard(&self, order_id: &str) -> Result<Option<SettlementGuard>, StoreError> {
        Ok(self.tables.read().await.guards.get(order_id).cloned())
    }

    async fn put_guard(&self, order_id: &str, guard: &SettlementGuard) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .guards
            .insert(order_id.to_string(), guard.clone());
        Ok(())
    }

    async fn clear_guard(&self, order_id: &str) -> Result<(), StoreError> {
        self.tables.write().await.guards.remove(order_id);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use order_engine_types::{OrderPayload, OrderStatus};
    use rust_decimal_macros::dec;

    fn create_test_order(id: &str, created_at: u64) -> Order {
        Order::new(id, &OrderPayload::new("SOL", "USDC", dec!(100)), created_at)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order("order-1", 1_000);

        store.create_order(&order).await.unwrap();

        let retrieved = store.get_order("order-1").await.unwrap();
        assert_eq!(retrieved, Some(order));
        assert_eq!(store.get_order("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_id_error() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order("order-1", 1_000);

        store.create_order(&order).await.unwrap();
        let result = store.create_order(&order).await;

        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn test_update_follows_lifecycle() {
        let store = InMemoryOrderStore::new();
        store.create_order(&create_test_order("order-1", 1_000)).await.unwrap();

        let updated = store
            .update_order("order-1", &OrderChanges::status(OrderStatus::Routing))
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Routing);

        let result = store
            .update_order("order-1", &OrderChanges::status(OrderStatus::Confirmed))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::Transition(OrderError::IllegalTransition { .. }))
        ));

        let failed = store
            .update_order("order-1", &OrderChanges::failed("boom"))
            .await
            .unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = InMemoryOrderStore::new();
        let result = store
            .update_order("missing", &OrderChanges::status(OrderStatus::Routing))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = InMemoryOrderStore::new();
        store.create_order(&create_test_order("order-1", 1_000)).await.unwrap();
        store.create_order(&create_test_order("order-2", 3_000)).await.unwrap();
        store.create_order(&create_test_order("order-3", 2_000)).await.unwrap();

        let ids: Vec<String> = store
            .list_orders(0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["order-2", "order-3", "order-1"]);

        let page = store.list_orders(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "order-3");
    }

    #[tokio::test]
    async fn test_guard_lifecycle() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.get_guard("order-1").await.unwrap(), None);

        let guard = SettlementGuard::in_flight("raydium");
        store.put_guard("order-1", &guard).await.unwrap();
        assert_eq!(store.get_guard("order-1").await.unwrap(), Some(guard));

        let executed = SettlementGuard::Executed {
            route: "raydium".to_string(),
            receipt: SwapReceipt {
                settlement_ref: "tx".to_string(),
                executed_price: dec!(1.0),
                output_amount: dec!(99.7),
                timestamp: 5,
            },
        };
        store.put_guard("order-1", &executed).await.unwrap();
        assert_eq!(store.get_guard("order-1").await.unwrap(), Some(executed));

        store.clear_guard("order-1").await.unwrap();
        store.clear_guard("order-1").await.unwrap();
        assert_eq!(store.get_guard("order-1").await.unwrap(), None);
    }
}
