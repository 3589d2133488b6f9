//! Error types for store operations.

use shared_types::MarshalError;
use st_01_key_value::KvsError;
use st_02_patricia_trie::TrieError;
use thiserror::Error;

/// Failures of the store layer.
///
/// Everything here is fatal for the enclosing transformation: the node
/// must abandon it and stop accepting work until an operator resumes from
/// a known good state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A trie operation failed.
    #[error(transparent)]
    Trie(#[from] TrieError),

    /// The key-value layer failed.
    #[error(transparent)]
    Kvs(#[from] KvsError),

    /// A stored record does not decode.
    #[error("stored record does not decode: {0}")]
    Marshal(#[from] MarshalError),

    /// The store contradicts its own invariants, e.g. a history that
    /// references a missing response or never reaches a creation update.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}
