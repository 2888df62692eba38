//! itemsvc-server: HTTP service over a bounded Postgres pool
//!
//! Exposes a health check, a read-only item listing and a Prometheus
//! scrape endpoint. The pool and the request counters are built once at
//! startup and passed to handlers through [`AppState`].

pub mod db;
pub mod http;
pub mod metrics;
pub mod state;

pub use db::{ConnectionPool, PgConnector, PoolConfig, PoolError};
pub use http::{run_server, ServerConfig, ServerError};
pub use metrics::RequestCounter;
pub use state::AppState;
