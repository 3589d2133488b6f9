//! # Request Signing
//!
//! Signature schemes verify a request's canonical unsigned bytes against
//! the public key stored in the caller's account. Like hashing, the scheme
//! is chosen by name from the consensus snapshot.

use crate::errors::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::sync::Arc;

/// A named signature scheme over raw byte payloads.
///
/// Keys and signatures travel as raw bytes; each scheme defines their
/// lengths and rejects malformed material instead of panicking.
pub trait SignatureScheme: Send + Sync {
    /// The name persisted in consensus snapshots.
    fn name(&self) -> &'static str;

    /// Signs `payload` with a raw private key.
    fn sign(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verifies `signature` over `payload` against a raw public key.
    /// Returns `Ok(false)` for a well-formed but wrong signature.
    fn verify(
        &self,
        payload: &[u8],
        public_key: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError>;
}

/// Ed25519, the default request signature scheme.
///
/// Deterministic nonces: signing needs no randomness source.
#[derive(Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl Ed25519Scheme {
    fn signing_key(private_key: &[u8]) -> Result<SigningKey, CryptoError> {
        let seed: [u8; 32] = private_key
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("ed25519 private key must be 32 bytes".into()))?;
        Ok(SigningKey::from_bytes(&seed))
    }

    fn verifying_key(public_key: &[u8]) -> Result<VerifyingKey, CryptoError> {
        let bytes: [u8; 32] = public_key
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("ed25519 public key must be 32 bytes".into()))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::MalformedKey(format!("ed25519 public key: {e}")))
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn name(&self) -> &'static str {
        "ed25519"
    }

    fn sign(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = Self::signing_key(private_key)?;
        Ok(key.sign(payload).to_bytes().to_vec())
    }

    fn verify(
        &self,
        payload: &[u8],
        public_key: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let key = Self::verifying_key(public_key)?;
        let signature = Signature::from_slice(signature).map_err(|e| {
            CryptoError::MalformedSignature(format!("ed25519 signature: {e}"))
        })?;
        Ok(key.verify(payload, &signature).is_ok())
    }
}

/// Resolves a persisted scheme name to an implementation.
pub fn signature_scheme_named(name: &str) -> Result<Arc<dyn SignatureScheme>, CryptoError> {
    match name {
        "ed25519" => Ok(Arc::new(Ed25519Scheme)),
        other => Err(CryptoError::UnknownAlgorithm(other.to_string())),
    }
}

// =============================================================================
// KEY PAIR
// =============================================================================

/// An Ed25519 key pair held in memory, mainly for tools and tests.
pub struct Ed25519KeyPair {
    signing: SigningKey,
}

impl Ed25519KeyPair {
    /// Derives a key pair from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The raw public key bytes.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// The public key as the hex string accounts store.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Signs `payload`, returning the raw signature bytes.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.signing.sign(payload).to_bytes().to_vec()
    }
}
