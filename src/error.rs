//! Error types for export-tracker
//!
//! Poll-loop failures never surface here: the poller converts them into task
//! state (`Failed` + error message) or log output. These types cover the
//! fallible edges a caller sees — construction, storage, and the status
//! client.

use thiserror::Error;

/// Result type alias for export-tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for export-tracker
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "endpoint.base_url")
        key: Option<String>,
    },

    /// Durable storage operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Network error while querying the status endpoint
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Status endpoint returned a non-success response
    #[error("status endpoint error: {0}")]
    Endpoint(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new pollers
    #[error("shutdown in progress: not accepting new pollers")]
    ShuttingDown,
}

/// Durable-storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to open or connect to the backing store
    #[error("failed to connect to storage: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Persisted task state could not be decoded
    #[error("persisted task state is corrupt: {0}")]
    Corrupted(String),
}
