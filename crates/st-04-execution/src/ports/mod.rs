//! Ports of the execution subsystem.

pub mod outbound;

pub use outbound::{
    CallContext, CallTarget, ClassLoader, ClassLoaderProvider, CodeExecutor, ExecutionEffects,
    ExecutorOutcome,
};
