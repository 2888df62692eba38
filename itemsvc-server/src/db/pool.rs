//! Database connection pool management
//!
//! A bounded pool created once at startup and shut down once at exit.
//!
//! - A semaphore caps the number of checked-out connections at
//!   `max_connections`; idle connections hold no permit.
//! - Every checkout is tracked by [`ConnectionId`]. A connection is either
//!   in the idle stack or in the checked-out set, never both.
//! - Checkouts are handed out as [`PooledConnection`] guards. Dropping the
//!   guard returns the connection, so every exit path of a handler
//!   (early `?` return, panic, cancelled request) gives it back.
//! - A connection that reports itself broken after an I/O failure is closed
//!   on return instead of being recycled, and idle connections are pinged
//!   before being handed out again.
//! - Returning an id that is not checked out is reported as
//!   [`PoolError::DoubleRelease`] and the connection is discarded instead
//!   of being pushed onto the idle stack a second time.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::PoolConfig;
use super::connection::{Connection, Connector};

/// Pool-assigned identity of one open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Pool error type
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Database unreachable, credentials rejected or bad size bounds.
    #[error("database pool initialization failed: {0}")]
    Initialization(String),

    /// Used before `initialize` finished or after `shutdown` began.
    #[error("database pool is not available")]
    Unavailable,

    #[error("timed out after {}s waiting for a database connection", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to open database connection: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("connection {0} was released twice")]
    DoubleRelease(ConnectionId),
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum number of connections checked out at once
    pub max_size: usize,
    /// Open connections, idle plus checked out
    pub open: usize,
    /// Connections waiting in the pool
    pub idle: usize,
    /// Connections checked out to handlers
    pub in_use: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initializing,
    Running,
    ShutDown,
}

struct Slot {
    id: ConnectionId,
    conn: Box<dyn Connection>,
}

struct PoolState {
    lifecycle: Lifecycle,
    /// LIFO so the most recently returned connection is reused first
    idle: Vec<Slot>,
    checked_out: HashSet<ConnectionId>,
    open: usize,
}

struct PoolInner {
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<PoolState>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
}

/// Bounded connection pool. Cheap to clone; clones share one pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create an uninitialized pool. Nothing is opened until
    /// [`initialize`](Self::initialize).
    pub fn new(connector: impl Connector, config: PoolConfig) -> Self {
        let max = config.max_connections as usize;
        Self {
            inner: Arc::new(PoolInner {
                config,
                connector: Arc::new(connector),
                state: Mutex::new(PoolState {
                    lifecycle: Lifecycle::Uninitialized,
                    idle: Vec::with_capacity(max),
                    checked_out: HashSet::with_capacity(max),
                    open: 0,
                }),
                permits: Arc::new(Semaphore::new(max)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Open `min_connections` eagerly and mark the pool usable.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Initialization`] if the configuration is invalid,
    /// the pool was already initialized, or any connection fails to open.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let config = &self.inner.config;
        config.validate()?;

        {
            let mut state = self.lock();
            if state.lifecycle != Lifecycle::Uninitialized {
                return Err(PoolError::Initialization(
                    "pool already initialized".to_string(),
                ));
            }
            state.lifecycle = Lifecycle::Initializing;
        }

        tracing::info!(
            url = %config.redacted_url(),
            min = config.min_connections,
            max = config.max_connections,
            "Creating database pool"
        );

        let mut opened = Vec::with_capacity(config.min_connections as usize);
        for _ in 0..config.min_connections {
            match self.inner.connector.connect().await {
                Ok(conn) => opened.push(Slot {
                    id: self.next_id(),
                    conn,
                }),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create database pool");
                    {
                        let mut state = self.lock();
                        if state.lifecycle == Lifecycle::Initializing {
                            state.lifecycle = Lifecycle::Uninitialized;
                        }
                    }
                    close_all(opened).await;
                    return Err(PoolError::Initialization(e.to_string()));
                }
            }
        }

        let aborted = {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::Initializing {
                state.open = opened.len();
                state.idle.append(&mut opened);
                state.lifecycle = Lifecycle::Running;
                false
            } else {
                true
            }
        };

        if aborted {
            // shutdown() ran while connections were being opened
            close_all(opened).await;
            return Err(PoolError::Unavailable);
        }

        tracing::info!("Database pool created");
        Ok(())
    }

    /// Check out a connection, waiting up to `acquire_timeout` for a slot.
    ///
    /// Reuses an idle connection when one exists and still answers a ping,
    /// otherwise opens a new one. Dead idle connections are closed and
    /// dropped from the pool on the way.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Unavailable`] before `initialize` or after `shutdown`
    /// - [`PoolError::Timeout`] when every slot stays checked out
    /// - [`PoolError::Connect`] when a fresh connection cannot be opened
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        if self.lock().lifecycle != Lifecycle::Running {
            return Err(PoolError::Unavailable);
        }

        let timeout = self.inner.config.acquire_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let permit = match tokio::time::timeout_at(
                deadline,
                self.inner.permits.clone().acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                // Semaphore is closed by shutdown()
                Ok(Err(_)) => return Err(PoolError::Unavailable),
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = timeout.as_secs(),
                        in_use = self.status().in_use,
                        "Timed out waiting for a database connection"
                    );
                    return Err(PoolError::Timeout(timeout));
                }
            };

            let reused = {
                let mut state = self.lock();
                if state.lifecycle != Lifecycle::Running {
                    return Err(PoolError::Unavailable);
                }
                match state.idle.pop() {
                    Some(slot) => {
                        state.checked_out.insert(slot.id);
                        Some(slot)
                    }
                    None => {
                        // Reserve the slot before the connect await
                        state.open += 1;
                        None
                    }
                }
            };

            let Some(slot) = reused else {
                let slot = self.open_checked_out().await?;
                tracing::debug!(connection = %slot.id, "Checked out new connection");
                return Ok(self.guard(slot, permit));
            };

            // The server may have dropped the session while it sat idle.
            // The guard is built first so a cancelled ping still returns it.
            let mut conn = self.guard(slot, permit);
            match conn.ping().await {
                Ok(()) => {
                    tracing::debug!(connection = %conn.id(), "Checked out connection");
                    return Ok(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        connection = %conn.id(),
                        error = %e,
                        "Idle connection failed ping, discarding it"
                    );
                    conn.retire();
                }
            }
        }
    }

    fn guard(&self, slot: Slot, permit: OwnedSemaphorePermit) -> PooledConnection {
        PooledConnection {
            pool: self.clone(),
            id: slot.id,
            conn: Some(slot.conn),
            _permit: permit,
        }
    }

    async fn open_checked_out(&self) -> Result<Slot, PoolError> {
        let conn = match self.inner.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                self.forget_open();
                tracing::error!(error = %e, "Failed to open database connection");
                return Err(PoolError::Connect(e));
            }
        };

        let id = self.next_id();
        let running = {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::Running {
                state.checked_out.insert(id);
                true
            } else {
                state.open = state.open.saturating_sub(1);
                false
            }
        };

        if !running {
            discard(conn);
            return Err(PoolError::Unavailable);
        }
        Ok(Slot { id, conn })
    }

    /// Return a checked-out connection to the idle set.
    ///
    /// Equivalent to dropping the guard, but reports a double release.
    pub fn release(&self, conn: PooledConnection) -> Result<(), PoolError> {
        conn.release()
    }

    /// Close every idle connection and refuse further checkouts.
    ///
    /// Connections still checked out are closed when they come back.
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        let (idle, in_use) = {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::ShutDown {
                return;
            }
            state.lifecycle = Lifecycle::ShutDown;
            let idle = std::mem::take(&mut state.idle);
            state.open = state.open.saturating_sub(idle.len());
            (idle, state.checked_out.len())
        };
        self.inner.permits.close();

        tracing::info!(idle = idle.len(), in_use, "Shutting down database pool");
        close_all(idle).await;
        tracing::info!("Database pool closed");
    }

    /// Whether `acquire` is currently accepted.
    pub fn is_available(&self) -> bool {
        self.lock().lifecycle == Lifecycle::Running
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        PoolStatus {
            max_size: self.inner.config.max_connections as usize,
            open: state.open,
            idle: state.idle.len(),
            in_use: state.checked_out.len(),
        }
    }

    fn check_in(&self, id: ConnectionId, conn: Box<dyn Connection>) -> Result<(), PoolError> {
        let reusable = !conn.is_broken();
        self.put_back(id, conn, reusable)
    }

    /// Move `id` out of the checked-out set. It joins the idle stack only if
    /// `reusable` and the pool is still running; otherwise it is closed.
    fn put_back(
        &self,
        id: ConnectionId,
        conn: Box<dyn Connection>,
        reusable: bool,
    ) -> Result<(), PoolError> {
        let mut state = self.lock();

        if !state.checked_out.remove(&id) {
            drop(state);
            tracing::error!(connection = %id, "Connection released twice, discarding it");
            discard(conn);
            return Err(PoolError::DoubleRelease(id));
        }

        let running = state.lifecycle == Lifecycle::Running;
        if running && reusable {
            state.idle.push(Slot { id, conn });
            drop(state);
            tracing::debug!(connection = %id, "Returned connection");
            return Ok(());
        }

        state.open = state.open.saturating_sub(1);
        drop(state);
        if running {
            tracing::warn!(connection = %id, "Closing broken connection");
        } else {
            tracing::debug!(connection = %id, "Closing connection returned after shutdown");
        }
        discard(conn);
        Ok(())
    }

    fn forget_open(&self) {
        let mut state = self.lock();
        state.open = state.open.saturating_sub(1);
    }

    fn next_id(&self) -> ConnectionId {
        ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("url", &self.inner.config.redacted_url())
            .field("status", &self.status())
            .finish()
    }
}

async fn close_all(slots: Vec<Slot>) {
    for slot in slots {
        if let Err(e) = slot.conn.close().await {
            tracing::warn!(connection = %slot.id, error = %e, "Error closing connection");
        }
    }
}

/// Close a connection from synchronous context.
fn discard(conn: Box<dyn Connection>) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "Error closing discarded connection");
            }
        });
    }
    // Without a runtime the connection is simply dropped, which closes the socket.
}

/// A connection checked out of the pool.
///
/// Returned to the pool when dropped or when [`release`](Self::release)
/// is called. Holds one semaphore permit for its whole life.
pub struct PooledConnection {
    pool: ConnectionPool,
    id: ConnectionId,
    conn: Option<Box<dyn Connection>>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Hand the connection back to the pool.
    pub fn release(mut self) -> Result<(), PoolError> {
        match self.conn.take() {
            Some(conn) => self.pool.check_in(self.id, conn),
            None => Err(PoolError::DoubleRelease(self.id)),
        }
    }

    /// Close the connection instead of returning it to the idle stack.
    fn retire(mut self) {
        if let Some(conn) = self.conn.take() {
            // put_back logs its own failures
            let _ = self.pool.put_back(self.id, conn, false);
        }
    }
}

// `conn` is only taken by `release(self)`, `retire(self)` and `drop`. The
// first two consume the guard and the last runs when it goes away, so the
// `expect`s below cannot fire through a live `&self` or `&mut self`.
impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_deref()
            .expect("BUG: PooledConnection used after release")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_deref_mut()
            .expect("BUG: PooledConnection used after release")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // check_in logs its own failures
            let _ = self.pool.check_in(self.id, conn);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("released", &self.conn.is_none())
            .finish()
    }
}
