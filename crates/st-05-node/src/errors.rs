//! Error types surfaced by the node façade.

use shared_crypto::CryptoError;
use st_03_state_store::StoreError;
use st_04_execution::{PipelineError, RejectionError};
use thiserror::Error;

/// Failures surfaced to node clients.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The request was refused during Check; nothing changed and nothing
    /// was stored. Fix the request and resubmit.
    #[error("request rejected: {0}")]
    Rejected(#[from] RejectionError),

    /// A fatal store error occurred; the node has halted intake and an
    /// operator must resume it from a known good state.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The consensus snapshot names an algorithm this build lacks.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The node is halted after a fatal error and refuses new requests.
    #[error("node is halted; resume from a known good state")]
    Halted,

    /// `add` gave up waiting. The request may still be committed and its
    /// response become visible later under its reference.
    #[error("timed out waiting for the response")]
    Timeout,

    /// The scheduler is gone; the node is shutting down.
    #[error("node is shutting down")]
    ShuttingDown,

    /// An internal invariant broke (poisoned lock, closed semaphore).
    #[error("node internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for NodeError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Rejected(rejection) => NodeError::Rejected(rejection),
            PipelineError::Store(store) => NodeError::Store(store),
            PipelineError::Crypto(crypto) => NodeError::Crypto(crypto),
        }
    }
}
