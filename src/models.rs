mod action_item;
mod ids;
mod note;

pub use action_item::{ActionItem, ActionItemFilter, ActionItemUpdate, NewActionItem};
pub use ids::{ActionItemId, NoteId};
pub use note::{Note, NoteBuilder};

/// Limit/offset window for list queries.
///
/// A `limit` of `None` returns every row after `offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    /// A page of at most `limit` rows starting at `offset`.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// Value bound to `LIMIT`; SQLite treats a negative limit as unbounded.
    pub(crate) fn sql_limit(&self) -> i64 {
        self.limit.map_or(-1, i64::from)
    }

    pub(crate) fn sql_offset(&self) -> i64 {
        i64::from(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_is_unbounded() {
        let page = Page::default();
        assert_eq!(page.sql_limit(), -1);
        assert_eq!(page.sql_offset(), 0);
    }

    #[test]
    fn explicit_page_binds_limit_and_offset() {
        let page = Page::new(10, 20);
        assert_eq!(page.sql_limit(), 10);
        assert_eq!(page.sql_offset(), 20);
    }
}
