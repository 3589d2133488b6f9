//! Well-known class and field names of the base code module.
//!
//! The store does not interpret contract classes, with one exception: the
//! externally-owned-account shape, whose balance/nonce/publicKey fields the
//! pipeline reads and force-updates.

use crate::signatures::{FieldSignature, StorageType};

/// Class of externally-owned accounts.
pub const EOA_CLASS: &str = "lang.ExternallyOwnedAccount";

/// Class of the node manifest object.
pub const MANIFEST_CLASS: &str = "lang.Manifest";

/// Base class of emitted events.
pub const EVENT_CLASS: &str = "lang.Event";

/// The balance field of an externally-owned account.
#[must_use]
pub fn balance_field() -> FieldSignature {
    FieldSignature::new(EOA_CLASS, "balance", StorageType::BigInteger)
}

/// The nonce field of an externally-owned account.
#[must_use]
pub fn nonce_field() -> FieldSignature {
    FieldSignature::new(EOA_CLASS, "nonce", StorageType::BigInteger)
}

/// The public key field of an externally-owned account (hex string).
#[must_use]
pub fn public_key_field() -> FieldSignature {
    FieldSignature::new(EOA_CLASS, "publicKey", StorageType::String)
}
