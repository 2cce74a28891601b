use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::{Executor, now_timestamp, timestamp_column};
use crate::db::ConnectionPool;
use crate::error::{Result, StoreError};
use crate::models::{
    ActionItem, ActionItemFilter, ActionItemId, ActionItemUpdate, NewActionItem, NoteId,
};

const ITEM_COLUMNS: &str = "id, note_id, text, done, created_at";
const INSERT_ITEM: &str =
    "INSERT INTO action_items (note_id, text, done, created_at) VALUES (?1, ?2, 0, ?3)";

/// CRUD for the `action_items` table.
pub struct ActionItemRepository {
    pool: Arc<ConnectionPool>,
}

impl Executor for ActionItemRepository {
    fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    fn table(&self) -> &'static str {
        "action_items"
    }
}

impl ActionItemRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Inserts one item, optionally owned by `note_id`.
    ///
    /// A `note_id` that references no note fails the foreign-key check.
    pub fn create(&self, text: &str, note_id: Option<NoteId>) -> Result<ActionItem> {
        validate_text(text)?;
        self.execute_one(|conn| {
            let now = now_timestamp();
            conn.execute(INSERT_ITEM, params![note_id.map(NoteId::get), text, now])?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM action_items WHERE id = ?1"),
                [id],
                item_from_row,
            )
        })
    }

    /// Inserts every item in one transaction and returns their ids in input
    /// order. Nothing is inserted if any item fails.
    pub fn create_batch(&self, items: &[NewActionItem]) -> Result<Vec<ActionItemId>> {
        for item in items {
            validate_text(&item.text)?;
        }
        let now = now_timestamp();
        let statements: Vec<(&str, Vec<Value>)> = items
            .iter()
            .map(|item| {
                (
                    INSERT_ITEM,
                    vec![
                        Value::from(item.note_id.map(NoteId::get)),
                        Value::from(item.text.clone()),
                        Value::from(now),
                    ],
                )
            })
            .collect();

        let ids = self.execute_transaction(&statements)?;
        Ok(ids.into_iter().map(ActionItemId::new).collect())
    }

    pub fn get_by_id(&self, id: ActionItemId) -> Result<Option<ActionItem>> {
        self.execute_one(|conn| {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM action_items WHERE id = ?1"),
                [id.get()],
                item_from_row,
            )
            .optional()
        })
    }

    /// Lists items newest first, optionally only those owned by one note.
    pub fn list_all(&self, filter: ActionItemFilter) -> Result<Vec<ActionItem>> {
        let page = filter.page;
        self.execute_one(|conn| match filter.note_id {
            Some(note_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM action_items WHERE note_id = ?1 \
                     ORDER BY id DESC LIMIT ?2 OFFSET ?3"
                ))?;
                let rows = stmt.query_map(
                    [note_id.get(), page.sql_limit(), page.sql_offset()],
                    item_from_row,
                )?;
                rows.collect()
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM action_items ORDER BY id DESC LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt.query_map([page.sql_limit(), page.sql_offset()], item_from_row)?;
                rows.collect()
            }
        })
    }

    /// Applies the fields set in `update`.
    ///
    /// Returns `false` when no item has `id`.
    pub fn update(&self, id: ActionItemId, update: &ActionItemUpdate) -> Result<bool> {
        update.validate()?;

        let mut assignments = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(text) = &update.text {
            assignments.push("text = ?");
            values.push(Value::from(text.clone()));
        }
        if let Some(done) = update.done {
            assignments.push("done = ?");
            values.push(Value::from(done));
        }
        values.push(Value::from(id.get()));

        let sql = format!(
            "UPDATE action_items SET {} WHERE id = ?",
            assignments.join(", ")
        );
        let changed = self.execute_one(|conn| conn.execute(&sql, params_from_iter(values.iter())))?;
        Ok(changed > 0)
    }

    /// Sets only the done flag.
    pub fn update_status(&self, id: ActionItemId, done: bool) -> Result<bool> {
        self.update(id, &ActionItemUpdate::status(done))
    }

    /// Deletes one item. Deleting a missing item is not an error.
    pub fn delete(&self, id: ActionItemId) -> Result<()> {
        self.execute_one(|conn| {
            conn.execute("DELETE FROM action_items WHERE id = ?1", [id.get()])
        })?;
        Ok(())
    }

    /// Deletes every item owned by `note_id` and returns how many went.
    pub fn delete_by_note_id(&self, note_id: NoteId) -> Result<usize> {
        self.execute_one(|conn| delete_items_for_note(conn, note_id))
    }

    /// Counts all items, or only those owned by `note_id`.
    pub fn count(&self, note_id: Option<NoteId>) -> Result<i64> {
        self.execute_one(|conn| match note_id {
            Some(note_id) => conn.query_row(
                "SELECT COUNT(*) FROM action_items WHERE note_id = ?1",
                [note_id.get()],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM action_items", [], |row| row.get(0)),
        })
    }
}

pub(crate) fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(StoreError::validation("action item text cannot be empty"));
    }
    Ok(())
}

/// Inserts `texts` for one optional owner on an already borrowed connection.
pub(crate) fn insert_action_items(
    conn: &Connection,
    texts: &[String],
    note_id: Option<NoteId>,
) -> rusqlite::Result<Vec<ActionItemId>> {
    let now = now_timestamp();
    let mut stmt = conn.prepare(INSERT_ITEM)?;
    let mut ids = Vec::with_capacity(texts.len());
    for text in texts {
        stmt.execute(params![note_id.map(NoteId::get), text, now])?;
        ids.push(ActionItemId::new(conn.last_insert_rowid()));
    }
    Ok(ids)
}

pub(crate) fn delete_items_for_note(conn: &Connection, note_id: NoteId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM action_items WHERE note_id = ?1", [note_id.get()])
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ActionItem> {
    Ok(ActionItem {
        id: ActionItemId::new(row.get(0)?),
        note_id: row.get::<_, Option<i64>>(1)?.map(NoteId::new),
        text: row.get(2)?,
        done: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}
