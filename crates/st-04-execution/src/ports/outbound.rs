//! # Driven Ports (Outbound)
//!
//! Dependencies the pipeline requires from its host: the code executor
//! that actually runs contract code, and the class-loader provider that
//! resolves installed modules.
//!
//! The executor must be deterministic given the state view it receives,
//! and must charge the gas meter for every observable operation; the
//! pipeline assumes neither reentrancy nor thread-safety of a single call.

use crate::errors::ExecutionAbort;
use crate::gas::GasMeter;
use shared_types::{
    ConstructorSignature, MethodSignature, StorageReference, StorageValue, TransactionReference,
    Update,
};
use st_03_state_store::StateView;
use std::sync::Arc;

// =============================================================================
// CLASS LOADING
// =============================================================================

/// An opaque handle on the classes of one installed module.
///
/// The pipeline never inspects it; it only caches it per
/// (classpath, state) and hands it to the executor.
pub trait ClassLoader: Send + Sync {
    /// The install-code transaction this loader serves.
    fn classpath(&self) -> &TransactionReference;
}

/// Resolves a classpath into a class loader against a given state.
pub trait ClassLoaderProvider: Send + Sync {
    fn load(
        &self,
        classpath: &TransactionReference,
        state: &dyn StateView,
    ) -> Result<Arc<dyn ClassLoader>, ExecutionAbort>;
}

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// What a call executes: a constructor, an instance method on a stored
/// receiver, or a static method.
#[derive(Clone, Debug)]
pub enum CallTarget<'a> {
    Constructor(&'a ConstructorSignature),
    Instance {
        method: &'a MethodSignature,
        receiver: StorageReference,
    },
    Static {
        method: &'a MethodSignature,
    },
}

/// Everything the executor needs to run one call deterministically.
#[derive(Clone, Debug)]
pub struct CallContext<'a> {
    /// Reference of the transaction being delivered; storage references
    /// allocated by this call use it as creator, with progressives dense
    /// from 0.
    pub transaction: TransactionReference,
    /// The installed module to execute against.
    pub classpath: TransactionReference,
    /// The paying account.
    pub caller: StorageReference,
    /// What to run.
    pub target: CallTarget<'a>,
    /// Deserialized actual arguments.
    pub actuals: &'a [StorageValue],
    /// The batch timestamp from the consensus collaborator.
    pub now: u64,
}

// =============================================================================
// EXECUTION OUTCOME
// =============================================================================

/// The observable effects of a completed execution.
#[derive(Clone, Debug, Default)]
pub struct ExecutionEffects {
    /// Return value of a method call, if any.
    pub result: Option<StorageValue>,
    /// The object a constructor call created.
    pub new_object: Option<StorageReference>,
    /// Field updates and class tags, in any order; the pipeline sorts.
    pub updates: Vec<Update>,
    /// Emitted event references, in emission order.
    pub events: Vec<StorageReference>,
}

/// What the executor reports when it does not abort.
#[derive(Clone, Debug)]
pub enum ExecutorOutcome {
    /// The code ran to completion.
    Success(ExecutionEffects),
    /// The code was reached and threw; class name and message travel to
    /// the response, the stack does not.
    Exception {
        class: String,
        message: String,
        effects: ExecutionEffects,
    },
}

// =============================================================================
// CODE EXECUTOR
// =============================================================================

/// The external engine that runs contract code.
pub trait CodeExecutor: Send + Sync {
    /// Runs a constructor or method call.
    ///
    /// `state` already reflects the upfront gas charge and nonce bump of
    /// the caller. Every observable operation must be charged on `gas`;
    /// exhausting it aborts the call.
    fn execute_call(
        &self,
        context: &CallContext<'_>,
        loader: &dyn ClassLoader,
        state: &dyn StateView,
        gas: &mut GasMeter,
    ) -> Result<ExecutorOutcome, ExecutionAbort>;

    /// Verifies and instruments a module being installed, returning the
    /// bytes to store. The pipeline has already charged storage gas for
    /// the raw module size.
    fn install_module(
        &self,
        module: &[u8],
        dependencies: &[TransactionReference],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, ExecutionAbort>;
}
