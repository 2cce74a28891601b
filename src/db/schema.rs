/// Table definitions for notes and action items.
///
/// Uses CREATE TABLE IF NOT EXISTS for idempotent execution. Timestamps are
/// Unix seconds written by the repositories.
pub const INITIAL_SCHEMA: &str = r#"
-- Notes table: free-text content with timestamps
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

-- Action items, optionally owned by a note
CREATE TABLE IF NOT EXISTS action_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id INTEGER,
    text TEXT NOT NULL,
    done INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
);
"#;

/// Column additions for databases created before the column existed.
///
/// Executed one statement per line; failures are ignored because the column
/// usually exists already.
pub const MIGRATIONS: &str = r#"
ALTER TABLE notes ADD COLUMN updated_at INTEGER
"#;

/// Indexes created after the tables, each one independently.
pub const INDEXES: &[(&str, &str)] = &[
    (
        "idx_notes_created_at",
        "CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at DESC)",
    ),
    (
        "idx_notes_updated_at",
        "CREATE INDEX IF NOT EXISTS idx_notes_updated_at ON notes(updated_at DESC)",
    ),
    (
        "idx_action_items_note_id",
        "CREATE INDEX IF NOT EXISTS idx_action_items_note_id ON action_items(note_id)",
    ),
    (
        "idx_action_items_done",
        "CREATE INDEX IF NOT EXISTS idx_action_items_done ON action_items(done)",
    ),
    (
        "idx_action_items_created_at",
        "CREATE INDEX IF NOT EXISTS idx_action_items_created_at ON action_items(created_at DESC)",
    ),
    (
        "idx_action_items_note_done",
        "CREATE INDEX IF NOT EXISTS idx_action_items_note_done ON action_items(note_id, done)",
    ),
    (
        "idx_action_items_note_created",
        "CREATE INDEX IF NOT EXISTS idx_action_items_note_created ON action_items(note_id, created_at DESC)",
    ),
];
