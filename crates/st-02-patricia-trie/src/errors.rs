//! Error types for trie operations.
//!
//! Both decoding and integrity failures mean the store under this trie can
//! no longer be trusted; the enclosing transformation must abandon.

use shared_types::MarshalError;
use st_01_key_value::KvsError;
use thiserror::Error;

/// Failures while reading or extending a trie.
#[derive(Debug, Error)]
pub enum TrieError {
    /// A node or out-of-line value referenced by hash is missing from the
    /// key-value store.
    #[error("trie integrity violated: record {missing} is referenced but absent")]
    Integrity { missing: String },

    /// A stored record does not parse as a trie node.
    #[error("trie node does not decode: {0}")]
    Decoding(#[from] MarshalError),

    /// The key-value layer failed.
    #[error(transparent)]
    Kvs(#[from] KvsError),
}
