use async_trait::async_trait;
use order_engine_types::{
    current_timestamp_ms, Order, OrderChanges, OrderError, OrderStatus, StageMetadata,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::store::{OrderStore, SettlementGuard, StoreError};

const CREATE_ORDERS: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    token_in TEXT NOT NULL,
    token_out TEXT NOT NULL,
    amount TEXT NOT NULL,
    status TEXT NOT NULL,
    selected_route TEXT,
    executed_price TEXT,
    settlement_ref TEXT,
    error TEXT,
    metadata TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

const CREATE_ORDERS_CREATED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders (created_at DESC, seq DESC)";

const CREATE_GUARDS: &str = r#"
CREATE TABLE IF NOT EXISTS settlement_guards (
    order_id TEXT PRIMARY KEY,
    guard TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SqliteOrderStore {
    pool: SqlitePool,
}

impl SqliteOrderStore {
    /// Open (creating if missing) the database at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Self::with_pool(pool).await
    }

    /// Create an in-memory SQLite database (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        // a single connection, every new connection would see an empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Self::with_pool(pool).await
    }

    /// Use an existing pool, running migrations first
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in [CREATE_ORDERS, CREATE_ORDERS_CREATED_INDEX, CREATE_GUARDS] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        }
        Ok(())
    }

    fn row_to_order(row: &SqliteRow) -> Result<Order, StoreError> {
        let status: String = row.get("status");
        let status = OrderStatus::from_str(&status)?;

        let metadata = row
            .get::<Option<String>, _>("metadata")
            .map(|json| serde_json::from_str::<StageMetadata>(&json))
            .transpose()
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        Ok(Order {
            id: row.get("id"),
            token_in: row.get("token_in"),
            token_out: row.get("token_out"),
            amount: parse_decimal(row.get("amount"))?,
            status,
            selected_route: row.get("selected_route"),
            executed_price: row
                .get::<Option<String>, _>("executed_price")
                .map(parse_decimal)
                .transpose()?,
            settlement_ref: row.get("settlement_ref"),
            error: row.get("error"),
            metadata,
            created_at: row.get::<i64, _>("created_at") as u64,
            updated_at: row.get::<i64, _>("updated_at") as u64,
        })
    }
}

fn parse_decimal(value: String) -> Result<Decimal, StoreError> {
    Decimal::from_str(&value).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn db_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::ConnectionError(e.to_string())
        }
        other => StoreError::DatabaseError(other.to_string()),
    }
}

fn metadata_json(metadata: &Option<StageMetadata>) -> Result<Option<String>, StoreError> {
    metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::SerializationError(e.to_string()))
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        let metadata = metadata_json(&order.metadata)?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, token_in, token_out, amount, status, selected_route,
                executed_price, settlement_ref, error, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.token_in)
        .bind(&order.token_out)
        .bind(order.amount.to_string())
        .bind(order.status.as_str())
        .bind(&order.selected_route)
        .bind(order.executed_price.map(|p| p.to_string()))
        .bind(&order.settlement_ref)
        .bind(&order.error)
        .bind(metadata)
        .bind(order.created_at as i64)
        .bind(order.updated_at as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateId(order.id.clone()))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn update_order(&self, id: &str, changes: &OrderChanges) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // write first so the transaction holds the write lock before it
        // reads; a deferred read-then-write upgrade fails with SQLITE_BUSY
        // instead of waiting on the busy timeout
        sqlx::query("UPDATE orders SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut order = Self::row_to_order(&row)?;

        if !order.status.can_transition_to(changes.status) {
            return Err(OrderError::IllegalTransition {
                from: order.status,
                to: changes.status,
            }
            .into());
        }
        order.apply(changes, current_timestamp_ms());

        sqlx::query(
            r#"
            UPDATE orders
            SET status = ?, selected_route = ?, executed_price = ?, settlement_ref = ?,
                error = ?, metadata = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(order.status.as_str())
        .bind(&order.selected_route)
        .bind(order.executed_price.map(|p| p.to_string()))
        .bind(&order.settlement_ref)
        .bind(&order.error)
        .bind(metadata_json(&order.metadata)?)
        .bind(order.updated_at as i64)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(order)
    }

    async fn get_order(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, offset: usize, limit: usize) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM orders ORDER BY created_at DESC, seq DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn get_guard(&self, order_id: &str) -> Result<Option<SettlementGuard>, StoreError> {
        let row = sqlx::query("SELECT guard FROM settlement_guards WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(|row| {
            let json: String = row.get("guard");
            serde_json::from_str(&json).map_err(|e| StoreError::SerializationError(e.to_string()))
        })
        .transpose()
    }

    async fn put_guard(&self, order_id: &str, guard: &SettlementGuard) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(guard).map_err(|e| StoreError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO settlement_guards (order_id, guard, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(order_id) DO UPDATE SET guard = excluded.guard, updated_at = excluded.updated_at
            "#,
        )
        .bind(order_id)
        .bind(json)
        .bind(current_timestamp_ms() as i64)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn clear_guard(&self, order_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM settlement_guards WHERE order_id = ?")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use order_engine_types::{OrderPayload, Quote, SwapReceipt};
    use rust_decimal_macros::dec;

    fn create_test_order(id: &str, created_at: u64) -> Order {
        Order::new(id, &OrderPayload::new("SOL", "USDC", dec!(100.5)), created_at)
    }

    #[tokio::test]
    async fn test_sqlite_create_and_get() {
        let store = SqliteOrderStore::in_memory().await.unwrap();
        let order = create_test_order("order-1", 1_000);

        store.create_order(&order).await.unwrap();

        let retrieved = store.get_order("order-1").await.unwrap();
        assert_eq!(retrieved, Some(order));
    }

    #[tokio::test]
    async fn test_sqlite_duplicate_id_error() {
        let store = SqliteOrderStore::in_memory().await.unwrap();
        let order = create_test_order("order-1", 1_000);

        store.create_order(&order).await.unwrap();
        let result = store.create_order(&order).await;

        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn test_sqlite_update_persists_metadata() {
        let store = SqliteOrderStore::in_memory().await.unwrap();
        store.create_order(&create_test_order("order-1", 1_000)).await.unwrap();

        let quotes = vec![Quote::priced("meteora", dec!(100), dec!(1), dec!(0.002), 7)];
        store
            .update_order("order-1", &OrderChanges::status(OrderStatus::Routing))
            .await
            .unwrap();
        let changes = OrderChanges::status(OrderStatus::Building)
            .with_route("meteora")
            .with_metadata(StageMetadata::Routing {
                selected_route: "meteora".to_string(),
                quotes: quotes.clone(),
            });
        let updated = store.update_order("order-1", &changes).await.unwrap();

        let retrieved = store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(retrieved, updated);
        assert_eq!(retrieved.selected_route.as_deref(), Some("meteora"));
        assert_eq!(
            retrieved.metadata,
            Some(StageMetadata::Routing {
                selected_route: "meteora".to_string(),
                quotes,
            })
        );
    }

    #[tokio::test]
    async fn test_sqlite_rejects_illegal_transition() {
        let store = SqliteOrderStore::in_memory().await.unwrap();
        store.create_order(&create_test_order("order-1", 1_000)).await.unwrap();

        let result = store
            .update_order("order-1", &OrderChanges::status(OrderStatus::Submitted))
            .await;
        assert!(matches!(result, Err(StoreError::Transition(_))));

        let order = store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_sqlite_list_newest_first() {
        let store = SqliteOrderStore::in_memory().await.unwrap();
        store.create_order(&create_test_order("order-1", 1_000)).await.unwrap();
        store.create_order(&create_test_order("order-2", 2_000)).await.unwrap();
        store.create_order(&create_test_order("order-3", 2_000)).await.unwrap();

        let ids: Vec<String> = store
            .list_orders(0, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["order-3", "order-2"]);
    }

    #[tokio::test]
    async fn test_sqlite_guard_round_trip() {
        let store = SqliteOrderStore::in_memory().await.unwrap();

        let executed = SettlementGuard::Executed {
            route: "raydium".to_string(),
            receipt: SwapReceipt {
                settlement_ref: "tx".to_string(),
                executed_price: dec!(1.01),
                output_amount: dec!(100.7),
                timestamp: 9,
            },
        };
        store.put_guard("order-1", &SettlementGuard::in_flight("raydium")).await.unwrap();
        store.put_guard("order-1", &executed).await.unwrap();
        assert_eq!(store.get_guard("order-1").await.unwrap(), Some(executed));

        store.clear_guard("order-1").await.unwrap();
        assert_eq!(store.get_guard("order-1").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_sqlite_file_concurrent_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(SqliteOrderStore::new(dir.path().join("orders.db")).await.unwrap());

        for n in 0..10 {
            store
                .create_order(&create_test_order(&format!("order-{n}"), 1_000 + n))
                .await
                .unwrap();
        }

        let mut tasks = Vec::new();
        for n in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let id = format!("order-{n}");
                for status in [
                    OrderStatus::Routing,
                    OrderStatus::Building,
                    OrderStatus::Submitted,
                ] {
                    store.update_order(&id, &OrderChanges::status(status)).await.unwrap();
                }
                store
                    .update_order(
                        &id,
                        &OrderChanges::status(OrderStatus::Confirmed).with_settlement("tx", dec!(1)),
                    )
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().status, OrderStatus::Confirmed);
        }

        // many writers on one row: every transition is checked against the committed state
        store.create_order(&create_test_order("shared", 5_000)).await.unwrap();
        let mut tasks = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update_order("shared", &OrderChanges::status(OrderStatus::Routing))
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(
            store.get_order("shared").await.unwrap().unwrap().status,
            OrderStatus::Routing
        );
    }

    #[tokio::test]
    async fn test_sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.db");

        {
            let store = SqliteOrderStore::new(&path).await.unwrap();
            store.create_order(&create_test_order("order-1", 1_000)).await.unwrap();
        }

        let store = SqliteOrderStore::new(&path).await.unwrap();
        let order = store.get_order("order-1").await.unwrap().unwrap();
        assert_eq!(order.amount, dec!(100.5));
    }
}
