//! Filesystem helpers for locating the database file.

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Gets the cross-platform database path.
///
/// Returns the path as `{data_dir}/notepool/app.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_database_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        StoreError::database("resolve database path", "failed to determine data directory")
    })?;

    Ok(data_dir.join("notepool").join("app.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::database(
                format!("create database directory {}", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}
