//! Persistence for the commerce backend.
//!
//! Every read and write goes through a [`Transaction`] obtained from a [`Store`].
//! Two implementations are provided: [`InMemoryStore`] for tests and local runs,
//! and [`PostgresStore`] for production. A best-effort [`Cache`] sits beside them.

pub mod cache;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{Cache, InMemoryCache, NoopCache};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{StockChange, Store, Transaction};
