pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;
pub mod utils;

pub use cache::{CacheStats, QueryCache};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use db::{ConnectionPool, ExhaustionPolicy, PoolConfig, PoolStatus, SchemaManager, TableStats};
pub use error::{ErrorKind, Result, StoreError};
pub use models::{
    ActionItem, ActionItemFilter, ActionItemId, ActionItemUpdate, NewActionItem, Note,
    NoteBuilder, NoteId, Page,
};
pub use repository::{ActionItemRepository, NoteRepository};
pub use service::{CachedRead, NoteService, StoreStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_opens_from_crate_root() {
        let dir = tempfile::tempdir().unwrap();
        let service = NoteService::open(&StoreConfig::for_path(dir.path().join("root.db")));
        assert!(service.is_ok());
    }

    #[test]
    fn types_accessible_from_crate_root() {
        let note = NoteBuilder::new().id(NoteId::new(1)).content("test").build();
        assert_eq!(note.content, "test");

        let update = ActionItemUpdate::status(true);
        assert_eq!(update.done, Some(true));

        let err = StoreError::not_found("note", 1);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
