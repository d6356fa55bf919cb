//! Error types for gnssrecorder.
//!
//! This module defines all error types used throughout the gnssrecorder crate.
//! Session-level failures (opening and closing a recording) are returned to the
//! caller; per-event write failures are absorbed by the writer thread.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for gnssrecorder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// The container file (or its directory) could not be created.
    #[error("failed to create recording at {path}: {source}")]
    CreateFailed {
        /// Path of the file or directory that could not be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The container was created but its schema could not be set up.
    ///
    /// The partially-initialized file is left on disk.
    #[error("failed to initialize GeoPackage schema in {path}: {source}")]
    SchemaInitFailed {
        /// Path to the partially-initialized file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A single row insert failed.
    #[error("failed to write to table '{table}': {source}")]
    WriteFailed {
        /// Table the write was aimed at.
        table: &'static str,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// The savepoint grouping one event's writes could not be opened,
    /// committed or rolled back.
    #[error("failed to {action} event: {source}")]
    EventTransaction {
        /// What was being done to the event.
        action: &'static str,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// Finalizing the container (checkpoint, journal mode, close) failed.
    #[error("failed to finalize recording at {path}: {source}")]
    CloseFailed {
        /// Path of the recording being closed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// The bounded writer queue is full and the event was dropped.
    #[error("writer queue is full ({capacity} events), event dropped")]
    Overloaded {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The file is not a GeoPackage.
    #[error("{path} is not a GeoPackage")]
    NotAGeoPackage {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// A read query against a recording failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Writer Errors ===
    /// The writer thread panicked before it could close the store.
    #[error("writer thread for {path} panicked")]
    WriterPanicked {
        /// Path of the recording the writer owned.
        path: PathBuf,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for gnssrecorder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a creation error for the given path.
    #[must_use]
    pub fn create_failed(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::CreateFailed {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create a write error for the given table.
    #[must_use]
    pub fn write_failed(table: &'static str, source: rusqlite::Error) -> Self {
        Self::WriteFailed { table, source }
    }

    /// Check if this error is a per-event write failure.
    #[must_use]
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailed { .. })
    }

    /// Check if this error comes from a full writer queue.
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Self::Overloaded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_error() -> rusqlite::Error {
        rusqlite::Connection::open_in_memory()
            .unwrap()
            .execute("INSERT INTO missing_table VALUES (1)", [])
            .unwrap_err()
    }

    #[test]
    fn test_create_failed_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::create_failed("/root/forbidden/a.gpkg", io_err);
        let msg = err.to_string();
        assert!(msg.contains("/root/forbidden/a.gpkg"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn test_schema_init_failed_display() {
        let err = Error::SchemaInitFailed {
            path: PathBuf::from("/tmp/x.gpkg"),
            source: sqlite_error(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.gpkg"));
        assert!(msg.contains("schema"));
    }

    #[test]
    fn test_write_failed() {
        let err = Error::write_failed("sat_data", sqlite_error());
        assert!(err.is_write_failure());
        assert!(!err.is_overloaded());
        assert!(err.to_string().contains("sat_data"));
    }

    #[test]
    fn test_event_transaction_display() {
        let err = Error::EventTransaction {
            action: "commit",
            source: sqlite_error(),
        };
        assert!(err.to_string().starts_with("failed to commit event"));
        assert!(!err.is_write_failure());
    }

    #[test]
    fn test_close_failed_display() {
        let err = Error::CloseFailed {
            path: PathBuf::from("/tmp/c.gpkg"),
            source: sqlite_error(),
        };
        assert!(err.to_string().contains("finalize recording at /tmp/c.gpkg"));
    }

    #[test]
    fn test_overloaded() {
        let err = Error::Overloaded { capacity: 16 };
        assert!(err.is_overloaded());
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = sqlite_error().into();
        assert!(matches!(err, Error::DatabaseQuery(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_not_a_geopackage_display() {
        let err = Error::NotAGeoPackage {
            path: PathBuf::from("/tmp/plain.db"),
        };
        assert!(err.to_string().contains("/tmp/plain.db"));
    }

    #[test]
    fn test_writer_panicked_display() {
        let err = Error::WriterPanicked {
            path: PathBuf::from("/tmp/s.gpkg"),
        };
        assert!(err.to_string().contains("panicked"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "bad prefix".to_string(),
        };
        assert!(err.to_string().contains("bad prefix"));
    }
}
