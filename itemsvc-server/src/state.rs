//! Application state shared across handlers

use std::sync::Arc;

use crate::db::ConnectionPool;
use crate::metrics::RequestCounter;

/// Shared application state
///
/// Built once at startup and handed to the router; handlers reach the pool
/// and the counters only through this.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    pool: ConnectionPool,
    counter: RequestCounter,
}

impl AppState {
    pub fn new(pool: ConnectionPool, counter: RequestCounter) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pool, counter }),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.inner.counter
    }
}
