use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::NoteId;

/// A free-text note.
///
/// Action items may point back at a note through their `note_id`; deleting
/// the note deletes those items with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier from the database.
    pub id: NoteId,
    /// The note's content.
    pub content: String,
    /// When this note was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When this note's content was last replaced.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use notepool::{NoteBuilder, NoteId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .content("Buy milk")
///     .build();
///
/// assert_eq!(note.id.get(), 1);
/// assert_eq!(note.content, "Buy milk");
/// assert_eq!(note.created_at, note.updated_at);
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    content: Option<String>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note ID.
    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the note content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `Note`.
    ///
    /// A missing `updated_at` falls back to `created_at`, and a missing
    /// `created_at` to the current time.
    ///
    /// # Panics
    ///
    /// Panics if `id` or `content` have not been set.
    pub fn build(self) -> Note {
        let created_at = self.created_at.unwrap_or_else(OffsetDateTime::now_utc);
        Note {
            id: self.id.expect("id is required"),
            content: self.content.expect("content is required"),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}
