//! Error types for the pluggable primitives.

use thiserror::Error;

/// Failures of the cryptographic layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// No implementation is registered under the given name.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A public or private key has the wrong length or structure.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// A signature blob has the wrong length or structure.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}
