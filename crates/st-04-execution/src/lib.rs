//! # st-04-execution
//!
//! Execution subsystem for Strata-Chain: the transaction pipeline that
//! turns requests into responses.
//!
//! ## Role in System
//!
//! - **Check**: validates a request against the current state view;
//!   failures are rejections that change nothing
//! - **Charge upfront**: debits the full gas limit and bumps the nonce
//! - **Deliver**: runs the responder for the request kind, calling the
//!   external code executor for constructor and method calls
//! - **Post**: refunds unused gas, merges and sorts updates canonically,
//!   classifies failures, assembles the response
//!
//! The pipeline is a pure function over (state view, consensus, now,
//! request); the [`ports`] module defines the collaborators the host must
//! provide.

pub mod adapters;
pub mod errors;
pub mod gas;
pub mod pipeline;
pub mod ports;

pub use errors::{ExecutionAbort, PipelineError, RejectionError};
pub use gas::GasMeter;
pub use pipeline::Pipeline;
pub use ports::{
    CallContext, CallTarget, ClassLoader, ClassLoaderProvider, CodeExecutor, ExecutionEffects,
    ExecutorOutcome,
};
