//! Order persistence
//!
//! `OrderStore` is the collaborator the pipeline writes every status
//! transition through. Two backends are provided: `InMemoryOrderStore` for
//! tests and single-process runs, and `SqliteOrderStore` for durable storage.

pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteOrderStore;
pub use store::{InMemoryOrderStore, OrderStore, SettlementGuard, StoreError};
