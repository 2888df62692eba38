//! Database layer - connection pool, driver and item repository
//!
//! # Design Principles
//!
//! - One bounded pool per process, passed explicitly through `AppState`
//! - Checkouts are scoped: a `PooledConnection` goes back on every exit path
//! - One fixed read-only query, autocommit, no transactions

pub mod config;
pub mod connection;
pub mod items;
pub mod pool;
pub mod postgres;

#[cfg(test)]
pub(crate) mod fake;

pub use config::PoolConfig;
pub use connection::{Connection, Connector};
pub use items::{Item, ItemRepo};
pub use pool::{ConnectionId, ConnectionPool, PoolError, PoolStatus, PooledConnection};
pub use postgres::PgConnector;
