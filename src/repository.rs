//! Typed CRUD over the connection pool.
//!
//! Each repository owns a handle to the pool and implements [`Executor`],
//! which keeps error wrapping in one place: every failure is reported as a
//! database error naming the repository's table.

mod action_items;
mod notes;

use std::sync::Arc;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params_from_iter};
use time::OffsetDateTime;

use crate::db::ConnectionPool;
use crate::error::Result;

pub use action_items::ActionItemRepository;
pub(crate) use action_items::{delete_items_for_note, insert_action_items, validate_text};
pub use notes::NoteRepository;
pub(crate) use notes::{delete_note_row, insert_note, validate_content};

/// Shared SQL execution for repositories.
pub trait Executor {
    /// The pool statements run on.
    fn pool(&self) -> &Arc<ConnectionPool>;

    /// Table name used in error messages.
    fn table(&self) -> &'static str;

    /// Runs `f` on one pooled connection in its own transaction.
    fn execute_one<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        self.pool()
            .run(&format!("execute query on {}", self.table()), f)
    }

    /// Runs `statements` in order on one connection and one transaction.
    ///
    /// Returns the last inserted row id after each statement. Any failure
    /// rolls back every statement.
    fn execute_transaction(&self, statements: &[(&str, Vec<Value>)]) -> Result<Vec<i64>> {
        self.pool().run(
            &format!("execute transaction on {}", self.table()),
            |conn| {
                let mut ids = Vec::with_capacity(statements.len());
                for (sql, params) in statements {
                    conn.execute(sql, params_from_iter(params.iter()))?;
                    ids.push(conn.last_insert_rowid());
                }
                Ok(ids)
            },
        )
    }
}

/// Current time truncated to whole seconds, as stored in the database.
pub(crate) fn now_timestamp() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Reads a Unix-seconds column as a timestamp.
pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let secs: i64 = row.get(idx)?;
    to_datetime(idx, secs)
}

pub(crate) fn to_datetime(idx: usize, secs: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{PoolConfig, SchemaManager};
    use tempfile::{TempDir, tempdir};

    /// A fresh pool on a temporary file with the schema created.
    pub fn pool() -> (TempDir, Arc<ConnectionPool>) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(ConnectionPool::new(PoolConfig::new(dir.path().join("repo.db"))).unwrap());
        SchemaManager::new(Arc::clone(&pool)).create_tables().unwrap();
        (dir, pool)
    }
}
