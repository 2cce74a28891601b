use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheStats, QueryCache};
use crate::config::StoreConfig;
use crate::db::{ConnectionPool, PoolStatus, SchemaManager, TableStats};
use crate::error::Result;
use crate::models::{
    ActionItem, ActionItemFilter, ActionItemId, ActionItemUpdate, Note, NoteId, Page,
};
use crate::repository::{
    ActionItemRepository, NoteRepository, delete_items_for_note, delete_note_row,
    insert_action_items, insert_note, validate_content, validate_text,
};

const GET_NOTE: &str = "get_note";
const LIST_NOTES: &str = "list_notes";
const GET_ACTION_ITEM: &str = "get_action_item";
const LIST_ACTION_ITEMS: &str = "list_action_items";

const GET_NOTE_TTL: Duration = Duration::from_secs(60);
const LIST_NOTES_TTL: Duration = Duration::from_secs(30);
const GET_ACTION_ITEM_TTL: Duration = Duration::from_secs(30);
const LIST_ACTION_ITEMS_TTL: Duration = Duration::from_secs(30);

/// A value held by the facade's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedRead {
    Note(Note),
    Notes(Vec<Note>),
    ActionItem(ActionItem),
    ActionItems(Vec<ActionItem>),
}

/// Combined table, cache, and pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub tables: TableStats,
    pub cache: CacheStats,
    pub pool: PoolStatus,
}

/// Cached facade over the note and action-item repositories.
///
/// Reads go through the cache; writes go to the repositories (or straight to
/// the pool for multi-row inserts) and then invalidate the cached reads they
/// affect. Invalidation is by query name, so every cached page and id of that
/// query is dropped.
///
/// # Examples
///
/// ```no_run
/// use notepool::{NoteService, StoreConfig};
///
/// # fn main() -> notepool::Result<()> {
/// let service = NoteService::open(&StoreConfig::for_path("data/app.db"))?;
///
/// let note = service.create_note("Buy milk")?;
/// assert_eq!(service.get_note(note.id)?, Some(note));
///
/// service.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct NoteService {
    pool: Arc<ConnectionPool>,
    schema: SchemaManager,
    notes: NoteRepository,
    action_items: ActionItemRepository,
    cache: QueryCache<CachedRead>,
}

impl NoteService {
    /// Opens the pool described by `config` and creates the schema.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::new(config.pool.clone())?);
        let service = Self::new(pool, QueryCache::new(config.cache_ttl));
        service.schema.create_tables()?;
        Ok(service)
    }

    /// Builds the facade from existing components.
    ///
    /// Does not create the schema; call `schema().create_tables()` first if
    /// the database may be new.
    pub fn new(pool: Arc<ConnectionPool>, cache: QueryCache<CachedRead>) -> Self {
        Self {
            schema: SchemaManager::new(Arc::clone(&pool)),
            notes: NoteRepository::new(Arc::clone(&pool)),
            action_items: ActionItemRepository::new(Arc::clone(&pool)),
            pool,
            cache,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    /// Uncached access to the note repository.
    pub fn notes(&self) -> &NoteRepository {
        &self.notes
    }

    /// Uncached access to the action-item repository.
    pub fn action_items(&self) -> &ActionItemRepository {
        &self.action_items
    }

    pub fn cache(&self) -> &QueryCache<CachedRead> {
        &self.cache
    }

    // --- Notes ---

    /// Returns the note with `id`. Found notes are cached; misses are not.
    pub fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        if let Some(CachedRead::Note(note)) = self.cache.get(GET_NOTE, &(id,)) {
            return Ok(Some(note));
        }

        let note = self.notes.get_by_id(id).map_err(|e| e.during("get note"))?;
        if let Some(note) = &note {
            self.cache
                .set(GET_NOTE, &(id,), CachedRead::Note(note.clone()), self.ttl(GET_NOTE_TTL));
        }
        Ok(note)
    }

    /// Lists notes newest first.
    pub fn list_notes(&self, page: Page) -> Result<Vec<Note>> {
        if let Some(CachedRead::Notes(notes)) = self.cache.get(LIST_NOTES, &(page,)) {
            return Ok(notes);
        }

        let notes = self.notes.list_all(page).map_err(|e| e.during("list notes"))?;
        self.cache.set(
            LIST_NOTES,
            &(page,),
            CachedRead::Notes(notes.clone()),
            self.ttl(LIST_NOTES_TTL),
        );
        Ok(notes)
    }

    pub fn create_note(&self, content: &str) -> Result<Note> {
        let note = self.notes.create(content).map_err(|e| e.during("create note"))?;
        self.invalidate(&[LIST_NOTES]);
        Ok(note)
    }

    /// Replaces a note's content. Returns `false` if the note does not exist.
    pub fn update_note(&self, id: NoteId, content: &str) -> Result<bool> {
        let updated = self
            .notes
            .update(id, content)
            .map_err(|e| e.during("update note"))?;
        if updated {
            self.invalidate(&[GET_NOTE, LIST_NOTES]);
        }
        Ok(updated)
    }

    /// Deletes a note and every action item it owns in one transaction.
    pub fn delete_note(&self, id: NoteId) -> Result<()> {
        let removed = self.pool.run("delete note", |conn| {
            let removed = delete_items_for_note(conn, id)?;
            delete_note_row(conn, id)?;
            Ok(removed)
        })?;
        debug!(note_id = %id, removed_items = removed, "deleted note");

        self.invalidate(&[GET_NOTE, LIST_NOTES, GET_ACTION_ITEM, LIST_ACTION_ITEMS]);
        Ok(())
    }

    pub fn count_notes(&self) -> Result<i64> {
        self.notes.count().map_err(|e| e.during("count notes"))
    }

    // --- Action items ---

    /// Returns the action item with `id`. Found items are cached; misses are not.
    pub fn get_action_item(&self, id: ActionItemId) -> Result<Option<ActionItem>> {
        if let Some(CachedRead::ActionItem(item)) = self.cache.get(GET_ACTION_ITEM, &(id,)) {
            return Ok(Some(item));
        }

        let item = self
            .action_items
            .get_by_id(id)
            .map_err(|e| e.during("get action item"))?;
        if let Some(item) = &item {
            self.cache.set(
                GET_ACTION_ITEM,
                &(id,),
                CachedRead::ActionItem(item.clone()),
                self.ttl(GET_ACTION_ITEM_TTL),
            );
        }
        Ok(item)
    }

    /// Lists action items newest first, optionally for one note.
    pub fn list_action_items(&self, filter: ActionItemFilter) -> Result<Vec<ActionItem>> {
        if let Some(CachedRead::ActionItems(items)) = self.cache.get(LIST_ACTION_ITEMS, &(filter,))
        {
            return Ok(items);
        }

        let items = self
            .action_items
            .list_all(filter)
            .map_err(|e| e.during("list action items"))?;
        self.cache.set(
            LIST_ACTION_ITEMS,
            &(filter,),
            CachedRead::ActionItems(items.clone()),
            self.ttl(LIST_ACTION_ITEMS_TTL),
        );
        Ok(items)
    }

    pub fn create_action_item(&self, text: &str, note_id: Option<NoteId>) -> Result<ActionItem> {
        let item = self
            .action_items
            .create(text, note_id)
            .map_err(|e| e.during("create action item"))?;
        self.invalidate(&[LIST_ACTION_ITEMS]);
        Ok(item)
    }

    /// Inserts `texts` in one transaction and returns their ids in order.
    ///
    /// Nothing is inserted if any text is blank or any insert fails.
    pub fn create_action_items_batch(
        &self,
        texts: &[String],
        note_id: Option<NoteId>,
    ) -> Result<Vec<ActionItemId>> {
        for text in texts {
            validate_text(text)?;
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.pool.run("create action items batch", |conn| {
            insert_action_items(conn, texts, note_id)
        })?;
        self.invalidate(&[LIST_ACTION_ITEMS]);
        Ok(ids)
    }

    /// Applies a partial update. Returns `false` if the item does not exist.
    pub fn update_action_item(&self, id: ActionItemId, update: &ActionItemUpdate) -> Result<bool> {
        let updated = self
            .action_items
            .update(id, update)
            .map_err(|e| e.during("update action item"))?;
        if updated {
            self.invalidate(&[GET_ACTION_ITEM, LIST_ACTION_ITEMS]);
        }
        Ok(updated)
    }

    /// Sets only the done flag.
    pub fn update_action_item_status(&self, id: ActionItemId, done: bool) -> Result<bool> {
        self.update_action_item(id, &ActionItemUpdate::status(done))
    }

    pub fn delete_action_item(&self, id: ActionItemId) -> Result<()> {
        self.action_items
            .delete(id)
            .map_err(|e| e.during("delete action item"))?;
        self.invalidate(&[GET_ACTION_ITEM, LIST_ACTION_ITEMS]);
        Ok(())
    }

    pub fn count_action_items(&self, note_id: Option<NoteId>) -> Result<i64> {
        self.action_items
            .count(note_id)
            .map_err(|e| e.during("count action items"))
    }

    // --- Batch ---

    /// Creates a note and its action items in one transaction.
    pub fn create_note_with_action_items(
        &self,
        content: &str,
        texts: &[String],
    ) -> Result<(Note, Vec<ActionItemId>)> {
        validate_content(content)?;
        for text in texts {
            validate_text(text)?;
        }

        let created = self.pool.run("create note with action items", |conn| {
            let note = insert_note(conn, content)?;
            let ids = insert_action_items(conn, texts, Some(note.id))?;
            Ok((note, ids))
        })?;
        self.invalidate(&[LIST_NOTES, LIST_ACTION_ITEMS]);
        Ok(created)
    }

    // --- Maintenance ---

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            tables: self.schema.stats()?,
            cache: self.cache.stats(),
            pool: self.pool.status(),
        })
    }

    /// Runs `ANALYZE` and `VACUUM`.
    pub fn optimize_database(&self) -> Result<()> {
        self.schema.optimize()
    }

    /// Closes pooled connections and drops every cached read.
    ///
    /// The service stays usable; the next call opens a fresh connection.
    pub fn cleanup(&self) {
        self.pool.close_all();
        self.cache.clear();
    }

    /// Closes pooled connections. Call on process shutdown.
    pub fn shutdown(&self) {
        self.pool.close_all();
    }

    /// Per-query TTL, never longer than the cache's configured default.
    fn ttl(&self, query_ttl: Duration) -> Option<Duration> {
        Some(query_ttl.min(self.cache.default_ttl()))
    }

    fn invalidate(&self, tags: &[&str]) {
        for tag in tags {
            self.cache.invalidate_tag(tag);
        }
    }
}
