//! Error types for encoding and decoding canonical bytes.

use thiserror::Error;

/// Failures while encoding or decoding canonical bytes.
///
/// Decoding errors indicate either corrupted storage or a peer speaking a
/// different dialect; both are surfaced to the caller, never panicked on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarshalError {
    /// The input ended before a complete value was read.
    #[error("unexpected end of input: wanted {wanted} more bytes, {available} available")]
    UnexpectedEof { wanted: usize, available: usize },

    /// A length-prefixed string was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A selector byte does not name any known variant.
    #[error("unknown selector {selector} for {context}")]
    UnknownSelector { context: &'static str, selector: u8 },

    /// The bytes decode to a value but are not its canonical encoding.
    /// Accepting them would let two byte strings name the same record.
    #[error("non-canonical encoding: {0}")]
    NonCanonical(&'static str),

    /// A four-byte scalar is not a valid Unicode code point.
    #[error("invalid character code point {0:#x}")]
    InvalidChar(u32),

    /// A full decode left unconsumed bytes at the end.
    #[error("{remaining} trailing bytes after a complete value")]
    TrailingBytes { remaining: usize },
}
