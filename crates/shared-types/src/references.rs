//! # References
//!
//! Identities of the two kinds of things the store tracks: transactions and
//! storage objects. Both are value types, cheap to copy and totally ordered
//! so that collections of them marshal deterministically.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width in bytes of a transaction reference (the node hash length).
pub const REFERENCE_LEN: usize = 32;

// =============================================================================
// TRANSACTION REFERENCE
// =============================================================================

/// Identity of a transaction: the node hash of its marshalled request.
///
/// Opaque fixed-width bytes; the store never interprets them beyond equality
/// and ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionReference([u8; REFERENCE_LEN]);

impl TransactionReference {
    /// Creates a reference from its raw hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; REFERENCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a reference from a slice. Returns `None` if the length is wrong.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; REFERENCE_LEN] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// The underlying hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; REFERENCE_LEN] {
        &self.0
    }
}

impl fmt::Debug for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{}...{}",
            hex::encode(&self.0[..4]),
            hex::encode(&self.0[REFERENCE_LEN - 2..])
        )
    }
}

impl From<[u8; REFERENCE_LEN]> for TransactionReference {
    fn from(bytes: [u8; REFERENCE_LEN]) -> Self {
        Self(bytes)
    }
}

impl Marshallable for TransactionReference {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_fixed(&self.0);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        let bytes = r.read_fixed(REFERENCE_LEN)?;
        Ok(Self(bytes.try_into().unwrap()))
    }
}

// =============================================================================
// STORAGE REFERENCE
// =============================================================================

/// Identity of a storage object: the transaction that created it plus a
/// progressive number, dense from 0 in deterministic allocation order
/// within that transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageReference {
    /// The creating transaction.
    pub transaction: TransactionReference,
    /// Allocation index within the creating transaction.
    pub progressive: u64,
}

impl StorageReference {
    /// Creates the reference of the `progressive`-th object of `transaction`.
    #[must_use]
    pub const fn new(transaction: TransactionReference, progressive: u64) -> Self {
        Self {
            transaction,
            progressive,
        }
    }
}

impl fmt::Debug for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.transaction, self.progressive)
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction, self.progressive)
    }
}

impl Marshallable for StorageReference {
    fn marshal(&self, w: &mut MarshalWriter) {
        self.transaction.marshal(w);
        w.write_compact_u64(self.progressive);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        let transaction = TransactionReference::unmarshal(r)?;
        let progressive = r.read_compact_u64()?;
        Ok(Self {
            transaction,
            progressive,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
