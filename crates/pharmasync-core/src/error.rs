//! Core error types for pharmasync-core.
//!
//! The hierarchy follows the failure classes of a reconciliation run:
//! source failures abort before any transaction is opened, store failures
//! force a rollback of the whole run, configuration failures stop the
//! process before either collaborator is built.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pharmasync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Fetching the snapshot from the CRM failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A store operation failed during the run
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Failures of the external record source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Login was rejected or no usable credentials were configured
    #[error("authentication against {service} failed: {message}")]
    Authentication { service: String, message: String },

    /// The query was rejected by the remote system
    #[error("query failed with HTTP {status}: {message}")]
    Query { status: u16, message: String },

    /// Network or TLS failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be interpreted as a record set
    #[error("malformed payload: {0}")]
    Payload(String),

    /// Reading a saved payload from disk failed
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A NOT NULL, UNIQUE or FOREIGN KEY constraint rejected the statement
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// An UPDATE keyed by a natural key matched no outlet
    #[error("no outlet row matched")]
    NoRowsAffected,
}

/// The store operation that was running when a [`StoreError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Open,
    Begin,
    Exists,
    DeactivateManaged,
    InsertOutlet,
    InsertMasterdata,
    SetActive,
    ListActive,
    Commit,
    Rollback,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreOperation::Open => "open",
            StoreOperation::Begin => "begin",
            StoreOperation::Exists => "exists",
            StoreOperation::DeactivateManaged => "deactivate_managed",
            StoreOperation::InsertOutlet => "insert_outlet",
            StoreOperation::InsertMasterdata => "insert_masterdata",
            StoreOperation::SetActive => "set_active",
            StoreOperation::ListActive => "list_active",
            StoreOperation::Commit => "commit",
            StoreOperation::Rollback => "rollback",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database failure tagged with the operation and, when one applies,
/// the natural key of the record being processed.
#[derive(Error, Debug)]
#[error("{operation} failed{}: {source}", key_suffix(.natural_key.as_deref()))]
pub struct StoreError {
    pub operation: StoreOperation,
    pub natural_key: Option<String>,
    #[source]
    pub source: DatabaseError,
}

fn key_suffix(key: Option<&str>) -> String {
    key.map(|k| format!(" for record '{k}'")).unwrap_or_default()
}

impl StoreError {
    pub fn new(operation: StoreOperation, source: impl Into<DatabaseError>) -> Self {
        Self {
            operation,
            natural_key: None,
            source: source.into(),
        }
    }

    pub fn for_key(
        operation: StoreOperation,
        natural_key: &str,
        source: impl Into<DatabaseError>,
    ) -> Self {
        Self {
            operation,
            natural_key: Some(natural_key.to_string()),
            source: source.into(),
        }
    }

    /// True when the failure came from a schema constraint rather than the
    /// connection itself.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.source, DatabaseError::ConstraintViolation(_))
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// The data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => DatabaseError::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| code.to_string()),
                ),
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
