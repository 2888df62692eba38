//! Item records and the fixed listing query
//!
//! Items are owned by the database. This service only reads them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};

use super::connection::Connection;

/// The one query this service issues. No parameters, no ordering:
/// rows come back in whatever order the database returns them.
pub const SELECT_ALL_ITEMS: &str = "SELECT id, name FROM items";

/// Item record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i32,
    pub name: String,
}

pub(crate) async fn select_all(conn: &mut PgConnection) -> Result<Vec<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(SELECT_ALL_ITEMS)
        .fetch_all(conn)
        .await
}

/// Item repository over a checked-out connection
pub struct ItemRepo<'a> {
    conn: &'a mut dyn Connection,
}

impl<'a> ItemRepo<'a> {
    pub fn new(conn: &'a mut dyn Connection) -> Self {
        Self { conn }
    }

    /// List every item.
    pub async fn list(&mut self) -> Result<Vec<Item>, sqlx::Error> {
        let items = self.conn.fetch_items().await?;
        tracing::debug!(count = items.len(), "Listed items");
        Ok(items)
    }
}
