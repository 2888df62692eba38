//! Postgres driver backed by `sqlx::PgConnection`

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection as _;

use super::config::PoolConfig;
use super::connection::{Connection, Connector};
use super::items::{self, Item};

/// Opens one `PgConnection` per call.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.connect_options())
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, sqlx::Error> {
        let conn = PgConnection::connect_with(&self.options).await?;
        Ok(Box::new(PgSession {
            conn,
            broken: false,
        }))
    }
}

struct PgSession {
    conn: PgConnection,
    broken: bool,
}

impl PgSession {
    fn observe<T>(&mut self, result: Result<T, sqlx::Error>) -> Result<T, sqlx::Error> {
        if let Err(e) = &result {
            if is_transport_error(e) {
                self.broken = true;
            }
        }
        result
    }
}

/// Errors after which the session can no longer be trusted. SQL errors
/// reported by the server leave the session usable.
fn is_transport_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

#[async_trait]
impl Connection for PgSession {
    async fn fetch_items(&mut self) -> Result<Vec<Item>, sqlx::Error> {
        let result = items::select_all(&mut self.conn).await;
        self.observe(result)
    }

    async fn ping(&mut self) -> Result<(), sqlx::Error> {
        let result = self.conn.ping().await;
        self.observe(result)
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    async fn close(self: Box<Self>) -> Result<(), sqlx::Error> {
        let session = *self;
        session.conn.close().await
    }
}
