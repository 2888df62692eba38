//! In-memory driver for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::connection::{Connection, Connector};
use super::items::Item;

#[derive(Default)]
struct Shared {
    unreachable: AtomicBool,
    failing_query: AtomicBool,
    generation: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    items: Vec<Item>,
}

/// Connector whose behavior tests flip at runtime.
#[derive(Clone, Default)]
pub struct FakeConnector {
    shared: Arc<Shared>,
}

impl FakeConnector {
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            shared: Arc::new(Shared {
                items,
                ..Shared::default()
            }),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.shared.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_failing_query(&self, failing: bool) {
        self.shared.failing_query.store(failing, Ordering::SeqCst);
    }

    /// Drop every open session as a server restart would. Connections opened
    /// before the call fail every query and ping from then on.
    pub fn restart_database(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(FakeConnection {
            generation: self.shared.generation.load(Ordering::SeqCst),
            shared: self.shared.clone(),
            dead: false,
        })
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, sqlx::Error> {
        if self.shared.unreachable.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection())
    }
}

struct FakeConnection {
    shared: Arc<Shared>,
    generation: usize,
    dead: bool,
}

impl FakeConnection {
    fn check_alive(&mut self) -> Result<(), sqlx::Error> {
        if self.generation != self.shared.generation.load(Ordering::SeqCst) {
            self.dead = true;
        }
        if self.dead {
            return Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn fetch_items(&mut self) -> Result<Vec<Item>, sqlx::Error> {
        self.check_alive()?;
        if self.shared.failing_query.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol(
                "relation \"items\" does not exist".to_string(),
            ));
        }
        Ok(self.shared.items.clone())
    }

    async fn ping(&mut self) -> Result<(), sqlx::Error> {
        self.check_alive()
    }

    fn is_broken(&self) -> bool {
        self.dead
    }

    async fn close(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
