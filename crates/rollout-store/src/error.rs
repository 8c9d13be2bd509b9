//! Error types for the rollout key-value store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a backing store.
///
/// Every variant is a backend failure. A missing key is reported as
/// `Ok(None)` by [`crate::KeyValueStore::get`], never as an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
