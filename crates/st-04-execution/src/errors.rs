//! Error types of the transaction pipeline.
//!
//! The split mirrors the four failure kinds of the node: rejections (no
//! state change, nothing stored), executor aborts (turned into failed
//! responses that are stored), and fatal store/crypto errors that abort
//! the whole transformation.

use shared_crypto::CryptoError;
use shared_types::FailureCause;
use st_03_state_store::StoreError;
use thiserror::Error;

/// Why a request was refused before execution charges.
///
/// A rejection changes nothing: no gas, no nonce bump, no stored
/// response. The caller gets this error and may fix and resubmit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectionError {
    /// The caller reference has no state in the store.
    #[error("unknown caller {0}")]
    UnknownCaller(String),

    /// The caller exists but is not an externally-owned account.
    #[error("caller {0} is not an externally-owned account")]
    CallerNotAnAccount(String),

    /// The declared nonce does not match the caller's current nonce.
    #[error("nonce mismatch: account is at {expected}, request declares {actual}")]
    NonceMismatch { expected: String, actual: String },

    /// The caller cannot pay `gasLimit * gasPrice` upfront.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: String, available: String },

    /// The signature does not verify over the request's unsigned bytes.
    #[error("invalid request signature")]
    InvalidSignature,

    /// The request was built for a different chain.
    #[error("chain id mismatch: node runs {expected}, request declares {actual}")]
    ChainIdMismatch { expected: String, actual: String },

    /// The gas limit exceeds the consensus maximum.
    #[error("gas limit {requested} exceeds the maximum of {max}")]
    GasLimitTooHigh { max: u64, requested: u64 },

    /// The gas price is below the consensus minimum.
    #[error("gas price {offered} is below the minimum of {min}")]
    GasPriceTooLow { min: u64, offered: u64 },

    /// The classpath (or a dependency) is not an installed module.
    #[error("classpath {0} does not name an installed module")]
    ClasspathNotFound(String),

    /// An identical request has already been delivered.
    #[error("transaction {0} has already been delivered")]
    AlreadyDelivered(String),

    /// An initial request arrived after the manifest was set.
    #[error("the node is already initialized")]
    ManifestAlreadySet,

    /// Initialization names an object the store does not know.
    #[error("manifest object {0} does not exist")]
    ManifestObjectMissing(String),
}

/// Why the executor aborted instead of returning an outcome.
///
/// Aborts are not rejections: gas has been charged, so they become failed
/// responses with a penalty.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionAbort {
    /// The gas limit was exhausted.
    #[error("out of gas")]
    OutOfGas,

    /// The code reached outside the allowed call surface.
    #[error("non-whitelisted call: {0}")]
    WhitelistViolation(String),

    /// The code performed a non-deterministic operation.
    #[error("non-deterministic operation: {0}")]
    DeterminismViolation(String),

    /// Any other executor-internal failure.
    #[error("executor failure: {0}")]
    Internal(String),
}

impl From<ExecutionAbort> for FailureCause {
    fn from(abort: ExecutionAbort) -> Self {
        match abort {
            ExecutionAbort::OutOfGas => FailureCause::OutOfGas,
            ExecutionAbort::WhitelistViolation(what) => FailureCause::WhitelistViolation(what),
            ExecutionAbort::DeterminismViolation(what) => FailureCause::DeterminismViolation(what),
            ExecutionAbort::Internal(what) => FailureCause::Internal(what),
        }
    }
}

/// Errors surfaced by [`crate::pipeline::Pipeline::deliver`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request was refused during Check; nothing changed.
    #[error("request rejected: {0}")]
    Rejected(#[from] RejectionError),

    /// The store failed; the enclosing transformation must abandon.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The consensus snapshot names an algorithm this build cannot
    /// provide; an operator problem, fatal for the transformation.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl PipelineError {
    /// True when the error is a plain rejection rather than a fault.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, PipelineError::Rejected(_))
    }
}
