mod pool;
mod schema;

use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

pub use pool::{ConnectionPool, ExhaustionPolicy, PoolConfig, PoolStatus, PooledConnection};
use schema::{INDEXES, INITIAL_SCHEMA, MIGRATIONS};

/// Row counts and file size for the store's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub notes: i64,
    pub action_items: i64,
    /// `page_count * page_size` of the main database file.
    pub size_bytes: i64,
}

/// Creates and maintains the database schema.
pub struct SchemaManager {
    pool: Arc<ConnectionPool>,
}

impl SchemaManager {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Creates tables, pending columns, and indexes.
    ///
    /// Safe to call on every start. Table creation errors propagate; a column
    /// that cannot be added or an index that cannot be created is logged and
    /// skipped.
    pub fn create_tables(&self) -> Result<()> {
        self.pool.run("create tables", |conn| {
            conn.execute_batch(INITIAL_SCHEMA)?;
            apply_column_migrations(conn);
            create_indexes(conn);
            Ok(())
        })?;
        info!("schema ready");
        Ok(())
    }

    /// Refreshes query-planner statistics and reclaims free pages.
    ///
    /// Runs outside a transaction because `VACUUM` cannot run inside one.
    pub fn optimize(&self) -> Result<()> {
        const OPERATION: &str = "optimize database";

        let conn = self.pool.acquire()?;
        conn.execute_batch("ANALYZE")
            .map_err(|e| StoreError::database(OPERATION, e))?;
        conn.execute_batch("VACUUM")
            .map_err(|e| StoreError::database(OPERATION, e))?;
        info!("database optimized");
        Ok(())
    }

    /// Returns row counts per table and the database size.
    pub fn stats(&self) -> Result<TableStats> {
        self.pool.run("get database stats", |conn| {
            let notes = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
            let action_items =
                conn.query_row("SELECT COUNT(*) FROM action_items", [], |row| row.get(0))?;
            let size_bytes = conn.query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )?;
            Ok(TableStats {
                notes,
                action_items,
                size_bytes,
            })
        })
    }
}

/// Executes column additions line by line, ignoring every failure.
fn apply_column_migrations(conn: &Connection) {
    for statement in MIGRATIONS.lines() {
        let trimmed = statement.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        match conn.execute(trimmed, []) {
            Ok(_) => info!(statement = trimmed, "applied column migration"),
            Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("duplicate column") => {
                debug!(statement = trimmed, "column already present");
            }
            Err(e) => warn!(statement = trimmed, error = %e, "column migration skipped"),
        }
    }
}

fn create_indexes(conn: &Connection) {
    for (name, sql) in INDEXES {
        if let Err(e) = conn.execute(sql, []) {
            warn!(index = name, error = %e, "could not create index");
        }
    }
}
