use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{ActionItemId, NoteId, Page};
use crate::error::{Result, StoreError};

/// A concrete to-do extracted from (or attached to) a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: ActionItemId,
    /// Owning note, if the item was saved alongside one.
    pub note_id: Option<NoteId>,
    pub text: String,
    pub done: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input row for batch inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActionItem {
    pub text: String,
    pub note_id: Option<NoteId>,
}

impl NewActionItem {
    pub fn new(text: impl Into<String>, note_id: Option<NoteId>) -> Self {
        Self {
            text: text.into(),
            note_id,
        }
    }
}

/// Partial update for an action item. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionItemUpdate {
    pub text: Option<String>,
    pub done: Option<bool>,
}

impl ActionItemUpdate {
    /// Update that only flips the done flag.
    pub fn status(done: bool) -> Self {
        Self {
            text: None,
            done: Some(done),
        }
    }

    /// Update that only replaces the text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            done: None,
        }
    }

    /// Rejects empty updates and blank replacement text.
    pub fn validate(&self) -> Result<()> {
        if self.text.is_none() && self.done.is_none() {
            return Err(StoreError::validation("no valid fields to update"));
        }
        if let Some(text) = &self.text
            && text.trim().is_empty()
        {
            return Err(StoreError::validation("text cannot be empty"));
        }
        Ok(())
    }
}

/// Filter for listing action items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ActionItemFilter {
    /// Restrict to items owned by this note.
    pub note_id: Option<NoteId>,
    pub page: Page,
}

impl ActionItemFilter {
    /// Every item belonging to `note_id`.
    pub fn for_note(note_id: NoteId) -> Self {
        Self {
            note_id: Some(note_id),
            page: Page::default(),
        }
    }
}
