use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{Executor, now_timestamp, timestamp_column, to_datetime};
use crate::db::ConnectionPool;
use crate::error::{Result, StoreError};
use crate::models::{Note, NoteBuilder, NoteId, Page};

const NOTE_COLUMNS: &str = "id, content, created_at, updated_at";

/// CRUD for the `notes` table.
pub struct NoteRepository {
    pool: Arc<ConnectionPool>,
}

impl Executor for NoteRepository {
    fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    fn table(&self) -> &'static str {
        "notes"
    }
}

impl NoteRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Inserts a note and returns it with its assigned id.
    ///
    /// Content is stored as given; it must contain something other than
    /// whitespace.
    pub fn create(&self, content: &str) -> Result<Note> {
        validate_content(content)?;
        self.execute_one(|conn| insert_note(conn, content))
    }

    /// Returns the note with `id`, or `None` if there is none.
    pub fn get_by_id(&self, id: NoteId) -> Result<Option<Note>> {
        self.execute_one(|conn| {
            conn.query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                [id.get()],
                note_from_row,
            )
            .optional()
        })
    }

    /// Lists notes newest first.
    pub fn list_all(&self, page: Page) -> Result<Vec<Note>> {
        self.execute_one(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes ORDER BY id DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map([page.sql_limit(), page.sql_offset()], note_from_row)?;
            rows.collect()
        })
    }

    /// Replaces a note's content and bumps `updated_at`.
    ///
    /// Returns `false` when no note has `id`.
    pub fn update(&self, id: NoteId, content: &str) -> Result<bool> {
        validate_content(content)?;
        let changed = self.execute_one(|conn| {
            conn.execute(
                "UPDATE notes SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content, now_timestamp(), id.get()],
            )
        })?;
        Ok(changed > 0)
    }

    /// Deletes a note; its action items go with it. Deleting a missing note
    /// is not an error.
    pub fn delete(&self, id: NoteId) -> Result<()> {
        self.execute_one(|conn| delete_note_row(conn, id))?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        self.execute_one(|conn| conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0)))
    }
}

pub(crate) fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(StoreError::validation("content is required"));
    }
    Ok(())
}

/// Inserts a note on an already borrowed connection.
pub(crate) fn insert_note(conn: &Connection, content: &str) -> rusqlite::Result<Note> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO notes (content, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![content, now],
    )?;
    let created = to_datetime(2, now)?;

    Ok(NoteBuilder::new()
        .id(NoteId::new(conn.last_insert_rowid()))
        .content(content)
        .created_at(created)
        .updated_at(created)
        .build())
}

/// Deletes a note on an already borrowed connection.
pub(crate) fn delete_note_row(conn: &Connection, id: NoteId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM notes WHERE id = ?1", [id.get()])
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let created_at = timestamp_column(row, 2)?;
    // Rows from before the updated_at column existed have NULL here.
    let updated_at = match row.get::<_, Option<i64>>(3)? {
        Some(secs) => to_datetime(3, secs)?,
        None => created_at,
    };

    Ok(NoteBuilder::new()
        .id(NoteId::new(row.get(0)?))
        .content(row.get::<_, String>(1)?)
        .created_at(created_at)
        .updated_at(updated_at)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[test]
    fn create_then_get_round_trips_content() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);

        let created = repo.create("Buy milk").unwrap();
        let fetched = repo.get_by_id(created.id).unwrap().expect("note should exist");

        assert_eq!(fetched, created);
        assert_eq!(fetched.content, "Buy milk");
    }

    #[test]
    fn create_rejects_blank_content() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);

        let err = repo.create("  \n\t ").unwrap_err();

        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn get_by_id_returns_none_for_missing_note() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);

        assert_eq!(repo.get_by_id(NoteId::new(999)).unwrap(), None);
    }

    #[test]
    fn list_all_is_newest_first_and_paginates() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);
        let ids: Vec<NoteId> = ["one", "two", "three"]
            .iter()
            .map(|c| repo.create(c).unwrap().id)
            .collect();

        let all = repo.list_all(Page::default()).unwrap();
        let listed: Vec<NoteId> = all.iter().map(|n| n.id).collect();
        assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);

        let page = repo.list_all(Page::new(1, 1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "two");
    }

    #[test]
    fn update_replaces_content_and_reports_existence() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);
        let note = repo.create("draft").unwrap();

        assert!(repo.update(note.id, "final").unwrap());
        assert!(!repo.update(NoteId::new(999), "final").unwrap());

        let fetched = repo.get_by_id(note.id).unwrap().unwrap();
        assert_eq!(fetched.content, "final");
        assert!(fetched.updated_at >= note.updated_at);
    }

    #[test]
    fn update_rejects_blank_content() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);
        let note = repo.create("draft").unwrap();

        let err = repo.update(note.id, "").unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, pool) = test_support::pool();
        let repo = NoteRepository::new(pool);
        let note = repo.create("temp").unwrap();

        repo.delete(note.id).unwrap();
        repo.delete(note.id).unwrap();

        assert_eq!(repo.get_by_id(note.id).unwrap(), None);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn legacy_rows_without_updated_at_fall_back_to_created_at() {
        let (_dir, pool) = test_support::pool();
        pool.run("seed", |conn| {
            conn.execute(
                "INSERT INTO notes (content, created_at, updated_at) VALUES ('old', 1700000000, NULL)",
                [],
            )
        })
        .unwrap();
        let repo = NoteRepository::new(pool);

        let note = repo.list_all(Page::default()).unwrap().remove(0);
        assert_eq!(note.updated_at, note.created_at);
        assert_eq!(note.created_at.unix_timestamp(), 1_700_000_000);
    }
}
