//! # Node Hashing
//!
//! The hashing algorithm fixes the width of every reference and trie key,
//! so a store can only be read with the algorithm it was written with.
//! The algorithm's name is persisted in the consensus snapshot and resolved
//! here.

use crate::errors::CryptoError;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Width of every digest produced by a node hasher.
pub const DIGEST_LEN: usize = 32;

/// A named 32-byte hashing algorithm.
pub trait Hasher: Send + Sync {
    /// The name persisted in consensus snapshots.
    fn name(&self) -> &'static str;

    /// Hashes `data` to a fixed-width digest.
    fn hash(&self, data: &[u8]) -> [u8; DIGEST_LEN];
}

/// SHA-256, the default node hasher.
#[derive(Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hash(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }
}

/// BLAKE3, an alternative hasher for chains that opt into it.
#[derive(Clone, Copy, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn hash(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        *blake3::hash(data).as_bytes()
    }
}

/// Resolves a persisted algorithm name to an implementation.
pub fn hasher_named(name: &str) -> Result<Arc<dyn Hasher>, CryptoError> {
    match name {
        "sha256" => Ok(Arc::new(Sha256Hasher)),
        "blake3" => Ok(Arc::new(Blake3Hasher)),
        other => Err(CryptoError::UnknownAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let digest = Sha256Hasher.hash(b"");
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hashers_differ() {
        let data = b"strata";
        assert_ne!(Sha256Hasher.hash(data), Blake3Hasher.hash(data));
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(hasher_named("sha256").unwrap().name(), "sha256");
        assert_eq!(hasher_named("blake3").unwrap().name(), "blake3");
        assert!(matches!(
            hasher_named("md5"),
            Err(CryptoError::UnknownAlgorithm(_))
        ));
    }
}
