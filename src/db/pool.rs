//! Connection pool for a single SQLite database file.
//!
//! Connections are handed out through [`PooledConnection`], which returns
//! them on drop. The mutex only guards the idle list and counters; opening,
//! closing, and using connections all happen outside it.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{debug, trace, warn};

use crate::config::{DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS};
use crate::error::{Result, StoreError};
use crate::utils::ensure_database_directory;

/// Pragmas applied to every new connection after `journal_mode`.
const CONNECTION_PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = 10000;
PRAGMA temp_store = MEMORY;
";

/// What `acquire` does when no idle connection is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Open an extra connection immediately. It is pooled on return only if
    /// the idle list has room, otherwise closed. Never blocks, but the number
    /// of live connections is unbounded under contention.
    Transient,
    /// Cap live connections at `max_connections` and wait up to `timeout` for
    /// one to be returned before failing.
    Block { timeout: Duration },
}

/// Settings for a [`ConnectionPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub path: PathBuf,
    pub max_connections: usize,
    pub policy: ExhaustionPolicy,
    /// How long a statement waits on a locked database file.
    pub busy_timeout: Duration,
}

impl PoolConfig {
    /// Default settings for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            policy: ExhaustionPolicy::Transient,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Point-in-time view of the pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections waiting in the pool.
    pub idle: usize,
    /// Open connections, idle or checked out.
    pub live: usize,
    pub max_connections: usize,
    pub policy: ExhaustionPolicy,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Connection>,
    live: usize,
    /// Bumped by `close_all`; connections from an older generation are closed
    /// instead of pooled when they come back.
    generation: u64,
}

enum Checkout {
    Idle(Connection, u64),
    Open(u64),
}

/// Thread-safe pool of SQLite connections.
pub struct ConnectionPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    /// Creates an empty pool. Connections are opened lazily.
    ///
    /// Creates the database's parent directory if it does not exist.
    pub fn new(config: PoolConfig) -> Result<Self> {
        ensure_database_directory(&config.path)?;
        Ok(Self {
            config,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
        })
    }

    /// Returns the pool's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Borrows a connection exclusively until the guard is dropped.
    ///
    /// The connection runs in autocommit mode; use [`ConnectionPool::run`] for
    /// commit-or-rollback semantics. A transaction still open when the guard
    /// drops is rolled back, and the connection is closed if that fails.
    pub fn acquire(&self) -> Result<PooledConnection<'_>> {
        let generation = match self.checkout()? {
            Checkout::Idle(conn, generation) => {
                trace!("reusing idle connection");
                return Ok(PooledConnection::new(self, conn, generation));
            }
            Checkout::Open(generation) => generation,
        };

        match self.open_connection() {
            Ok(conn) => Ok(PooledConnection::new(self, conn, generation)),
            Err(e) => {
                {
                    let mut state = self.lock_state();
                    state.live = state.live.saturating_sub(1);
                }
                self.available.notify_one();
                Err(StoreError::database("acquire connection", e))
            }
        }
    }

    /// Runs `f` inside a transaction on a pooled connection.
    ///
    /// Commits when `f` succeeds and rolls back when it fails. Any SQLite
    /// failure, including begin and commit, is reported as a database error
    /// for `operation`.
    pub fn run<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::database(operation, e))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| StoreError::database(operation, e))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(operation, error = %rollback, "rollback failed");
                }
                Err(StoreError::database(operation, e))
            }
        }
    }

    /// Closes every idle connection and empties the pool.
    ///
    /// Later `acquire` calls open fresh connections. Connections checked out
    /// at the time of the call are closed when they are returned.
    pub fn close_all(&self) {
        let drained = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.live = state.live.saturating_sub(state.idle.len());
            std::mem::take(&mut state.idle)
        };
        self.available.notify_all();

        let count = drained.len();
        drained.into_iter().for_each(close_connection);
        debug!(closed = count, "closed pooled connections");
    }

    /// Returns the current counters.
    pub fn status(&self) -> PoolStatus {
        let state = self.lock_state();
        PoolStatus {
            idle: state.idle.len(),
            live: state.live,
            max_connections: self.config.max_connections,
            policy: self.config.policy,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes an idle connection or reserves a slot for a new one.
    fn checkout(&self) -> Result<Checkout> {
        let max = self.config.max_connections;
        let deadline = match self.config.policy {
            ExhaustionPolicy::Transient => None,
            ExhaustionPolicy::Block { timeout } => Some((Instant::now() + timeout, timeout)),
        };

        let mut state = self.lock_state();
        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(Checkout::Idle(conn, state.generation));
            }

            let Some((deadline, timeout)) = deadline else {
                if state.live >= max {
                    debug!(live = state.live, max, "pool exhausted, opening transient connection");
                }
                state.live += 1;
                return Ok(Checkout::Open(state.generation));
            };

            if state.live < max {
                state.live += 1;
                return Ok(Checkout::Open(state.generation));
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(max, ?timeout, "timed out waiting for a pooled connection");
                return Err(StoreError::database(
                    "acquire connection",
                    format!("timed out after {timeout:?} waiting for one of {max} connections"),
                ));
            }

            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    fn open_connection(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.config.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        debug!(path = %self.config.path.display(), journal_mode = %mode, "opened connection");
        Ok(conn)
    }

    fn release(&self, conn: Connection, generation: u64) {
        // A borrower that left a transaction open would keep the write lock.
        let clean = if conn.is_autocommit() {
            true
        } else {
            match conn.execute_batch("ROLLBACK") {
                Ok(()) => {
                    debug!("rolled back transaction left open by borrower");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "rollback on return failed, discarding connection");
                    false
                }
            }
        };

        let surplus = {
            let mut state = self.lock_state();
            if clean
                && generation == state.generation
                && state.idle.len() < self.config.max_connections
            {
                state.idle.push(conn);
                None
            } else {
                state.live = state.live.saturating_sub(1);
                Some(conn)
            }
        };
        self.available.notify_one();

        if let Some(conn) = surplus {
            trace!("closing surplus connection");
            close_connection(conn);
        }
    }
}

fn close_connection(conn: Connection) {
    if let Err((_, e)) = conn.close() {
        warn!(error = %e, "failed to close connection");
    }
}

/// A connection borrowed from a [`ConnectionPool`].
///
/// Returned to the pool (or closed) when dropped.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
    generation: u64,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a ConnectionPool, conn: Connection, generation: u64) -> Self {
        Self {
            pool,
            conn: Some(conn),
            generation,
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.generation);
        }
    }
}
