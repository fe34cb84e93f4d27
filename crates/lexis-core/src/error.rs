//! Error types for lexis.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using lexis's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lexis operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Third-party entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),

    /// Caller supplied structurally invalid input.
    ///
    /// `keys` lists the attribute keys or requirement names involved so that
    /// top-level callers can report them back.
    #[error("Validation error: {message}")]
    Validation { message: String, keys: Vec<String> },

    /// Optimistic-lock check failed on save
    #[error("Version conflict on entity {id}: expected version {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: i64, actual: i64 },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure outside the engine's own error domain
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a validation error without offending keys.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            keys: Vec::new(),
        }
    }

    /// Build a validation error naming the offending keys.
    pub fn validation_with_keys<I, S>(message: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::Validation {
            message: message.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Stable machine-readable tag for structured failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::EntityNotFound(_) => "not_found",
            Error::Validation { .. } => "validation",
            Error::VersionConflict { .. } => "version_conflict",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
            Error::Io(_) => "io",
        }
    }

    /// Keys involved in the failure, if any.
    pub fn offending_keys(&self) -> &[String] {
        match self {
            Error::Validation { keys, .. } => keys,
            _ => &[],
        }
    }

    /// Whether the caller can fix the failure by changing its input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. } | Error::EntityNotFound(_)
                | Error::VersionConflict { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_entity_not_found() {
        let id = Uuid::nil();
        let err = Error::EntityNotFound(id);
        assert_eq!(err.to_string(), format!("Entity not found: {}", id));
    }

    #[test]
    fn test_validation_carries_keys() {
        let err = Error::validation_with_keys("need at least two keys", ["banco"]);
        assert_eq!(err.to_string(), "Validation error: need at least two keys");
        assert_eq!(err.offending_keys(), ["banco".to_string()]);
        assert_eq!(err.kind(), "validation");
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_validation_without_keys() {
        let err = Error::validation("missing target name");
        assert!(err.offending_keys().is_empty());
    }

    #[test]
    fn test_version_conflict_display() {
        let id = Uuid::nil();
        let err = Error::VersionConflict {
            id,
            expected: 3,
            actual: 4,
        };
        assert!(err.to_string().contains("expected version 3, found 4"));
        assert_eq!(err.kind(), "version_conflict");
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(Error::EntityNotFound(Uuid::nil()).kind(), "not_found");
        assert_eq!(Error::Config("x".into()).kind(), "config");
        assert_eq!(Error::Internal("x".into()).kind(), "internal");
        assert!(!Error::Internal("x".into()).is_caller_error());
        assert!(Error::EntityNotFound(Uuid::nil()).is_caller_error());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
