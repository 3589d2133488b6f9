//! Error types for key-value store operations.

use thiserror::Error;

/// Failures of the key-value layer. All fatal for the enclosing store
/// transformation; none are silently swallowed.
#[derive(Debug, Error)]
pub enum KvsError {
    /// The backing medium failed.
    #[error("key-value I/O error: {0}")]
    Io(String),

    /// A lock guarding the store was poisoned by a panicking thread.
    #[error("key-value store lock poisoned")]
    LockPoisoned,

    /// `begin` was called while a write transaction was already open.
    #[error("a write transaction is already open")]
    TransactionAlreadyOpen,

    /// `commit` or `rollback` was called with no open transaction.
    #[error("no open write transaction")]
    NoTransaction,
}

impl From<std::io::Error> for KvsError {
    fn from(e: std::io::Error) -> Self {
        KvsError::Io(e.to_string())
    }
}
