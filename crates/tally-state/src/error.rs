//! Error types for tally-state

use thiserror::Error;

/// Errors raised while connecting to or preparing a backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Data directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Connection(err.to_string())
    }
}

/// Errors produced by [`crate::CounterStore`] operations.
///
/// Every variant is a persistence failure from the caller's point of view;
/// the recorder surfaces all of them as a persistence error and rolls back.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend rejected or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A document could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Filesystem error from a file-backed store
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document was written by a newer schema than this build understands
    #[error("agent {agent_id}: schema version {found} is newer than supported version {supported}")]
    UnsupportedSchemaVersion {
        agent_id: String,
        found: u32,
        supported: u32,
    },

    /// Stored document is structurally invalid
    #[error("agent {agent_id}: corrupt document: {reason}")]
    CorruptDocument { agent_id: String, reason: String },

    /// A durable write did not finish within the configured bound
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
