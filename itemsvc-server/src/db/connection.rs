//! Driver seam between the pool and the database
//!
//! The pool only knows how to open, hand out and close connections.
//! Everything it hands out implements [`Connection`].

use async_trait::async_trait;

use super::items::Item;

/// Opens new connections on demand.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open one connection. Unreachable hosts and rejected credentials
    /// surface here.
    async fn connect(&self) -> Result<Box<dyn Connection>, sqlx::Error>;
}

/// A single live database connection.
#[async_trait]
pub trait Connection: Send {
    /// Run the fixed item query as a single autocommit read.
    async fn fetch_items(&mut self) -> Result<Vec<Item>, sqlx::Error>;

    /// Round-trip to the server to check the session is still alive.
    async fn ping(&mut self) -> Result<(), sqlx::Error>;

    /// True once the session has lost its transport (socket closed, TLS or
    /// protocol failure). A broken connection is never reused.
    fn is_broken(&self) -> bool;

    /// Terminate the session gracefully.
    async fn close(self: Box<Self>) -> Result<(), sqlx::Error>;
}
