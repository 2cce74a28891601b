//! Error taxonomy shared by every layer of the store.
//!
//! Driver errors never cross this boundary as types: they are flattened into a
//! message string tagged with the operation that was attempted.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by the pool, repositories, and the cached facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Caller input was rejected before reaching the database.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A referenced entity does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: i64 },

    /// Acquiring a connection, executing SQL, or committing failed.
    #[error("Database {operation} failed: {message}")]
    Database { operation: String, message: String },

    /// A collaborator outside the store (e.g. an extraction backend) failed.
    #[error("{service} service failed: {message}")]
    ExternalService { service: String, message: String },
}

/// Stable, machine-readable classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Database,
    ExternalService,
}

impl ErrorKind {
    /// Returns the tag boundary layers expose to their clients.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::ExternalService => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// Returns the HTTP status class a request boundary should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Database => 500,
            ErrorKind::ExternalService => 502,
        }
    }

    /// Returns true for errors caused by the caller rather than the system.
    pub fn is_user_error(self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::NotFound)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl StoreError {
    /// Builds a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a not-found error for the given resource name and id.
    pub fn not_found(resource: &'static str, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    /// Wraps any displayable failure as a database error for `operation`.
    pub fn database(operation: impl Into<String>, source: impl fmt::Display) -> Self {
        Self::Database {
            operation: operation.into(),
            message: source.to_string(),
        }
    }

    /// Wraps a failure of an external collaborator.
    pub fn external_service(service: impl Into<String>, source: impl fmt::Display) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: source.to_string(),
        }
    }

    /// Relabels a database error with the higher-level `operation` it
    /// happened in. Other kinds pass through unchanged.
    pub fn during(self, operation: &str) -> Self {
        match self {
            StoreError::Database { message, .. } => StoreError::Database {
                operation: operation.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Returns the error's classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation { .. } => ErrorKind::Validation,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Database { .. } => ErrorKind::Database,
            StoreError::ExternalService { .. } => ErrorKind::ExternalService,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_stable_codes_and_statuses() {
        let cases = [
            (StoreError::validation("content is required"), "VALIDATION_ERROR", 400),
            (StoreError::not_found("note", 7), "NOT_FOUND", 404),
            (StoreError::database("create note", "disk I/O error"), "DATABASE_ERROR", 500),
            (
                StoreError::external_service("ollama", "connection refused"),
                "EXTERNAL_SERVICE_ERROR",
                502,
            ),
        ];

        for (error, code, status) in cases {
            assert_eq!(error.kind().code(), code);
            assert_eq!(error.status_code(), status);
        }
    }

    #[test]
    fn database_error_message_names_the_operation() {
        let error = StoreError::database("create note with action items", "FOREIGN KEY constraint failed");
        let msg = error.to_string();

        assert!(msg.contains("create note with action items"));
        assert!(msg.contains("FOREIGN KEY constraint failed"));
    }

    #[test]
    fn database_error_flattens_rusqlite_errors_to_text() {
        let source = rusqlite::Error::QueryReturnedNoRows;
        let error = StoreError::database("get note", &source);

        match error {
            StoreError::Database { operation, message } => {
                assert_eq!(operation, "get note");
                assert_eq!(message, source.to_string());
            }
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn during_relabels_only_database_errors() {
        let relabeled = StoreError::database("execute query on notes", "locked").during("delete note");
        assert_eq!(
            relabeled,
            StoreError::Database {
                operation: "delete note".to_string(),
                message: "locked".to_string(),
            }
        );

        let validation = StoreError::validation("content is required").during("create note");
        assert!(matches!(validation, StoreError::Validation { .. }));
    }

    #[test]
    fn only_validation_and_not_found_are_user_errors() {
        assert!(ErrorKind::Validation.is_user_error());
        assert!(ErrorKind::NotFound.is_user_error());
        assert!(!ErrorKind::Database.is_user_error());
        assert!(!ErrorKind::ExternalService.is_user_error());
    }

    #[test]
    fn not_found_message_is_human_readable() {
        let error = StoreError::not_found("action item", 42);
        assert_eq!(error.to_string(), "action item not found: 42");
    }
}
