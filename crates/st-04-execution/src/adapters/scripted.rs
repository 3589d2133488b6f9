//! A programmable executor for tests and demos.
//!
//! Behaviors are registered under `Class.method` keys (`Class.<init>` for
//! constructors) and receive the same context, state view and gas meter a
//! real executor would.

use crate::errors::ExecutionAbort;
use crate::gas::GasMeter;
use crate::ports::{CallContext, CallTarget, ClassLoader, CodeExecutor, ExecutorOutcome};
use shared_types::TransactionReference;
use st_03_state_store::StateView;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A registered call behavior.
pub type CallBehavior = dyn Fn(&CallContext<'_>, &dyn StateView, &mut GasMeter) -> Result<ExecutorOutcome, ExecutionAbort>
    + Send
    + Sync;

/// Executor whose behavior per target is scripted by the test.
#[derive(Default)]
pub struct ScriptedExecutor {
    behaviors: RwLock<HashMap<String, Arc<CallBehavior>>>,
}

impl ScriptedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the behavior run for `key` (`Class.method`, or
    /// `Class.<init>` for constructors).
    pub fn on<F>(&self, key: impl Into<String>, behavior: F)
    where
        F: Fn(&CallContext<'_>, &dyn StateView, &mut GasMeter) -> Result<ExecutorOutcome, ExecutionAbort>
            + Send
            + Sync
            + 'static,
    {
        if let Ok(mut behaviors) = self.behaviors.write() {
            behaviors.insert(key.into(), Arc::new(behavior));
        }
    }

    /// The lookup key of a call target.
    #[must_use]
    pub fn key_of(target: &CallTarget<'_>) -> String {
        match target {
            CallTarget::Constructor(constructor) => format!("{}.<init>", constructor.definer),
            CallTarget::Instance { method, .. } | CallTarget::Static { method } => {
                format!("{}.{}", method.definer, method.name)
            }
        }
    }
}

impl CodeExecutor for ScriptedExecutor {
    fn execute_call(
        &self,
        context: &CallContext<'_>,
        _loader: &dyn ClassLoader,
        state: &dyn StateView,
        gas: &mut GasMeter,
    ) -> Result<ExecutorOutcome, ExecutionAbort> {
        let key = Self::key_of(&context.target);
        let behavior = self
            .behaviors
            .read()
            .ok()
            .and_then(|behaviors| behaviors.get(&key).cloned())
            .ok_or_else(|| ExecutionAbort::Internal(format!("no behavior scripted for {key}")))?;
        behavior(context, state, gas)
    }

    fn install_module(
        &self,
        module: &[u8],
        _dependencies: &[TransactionReference],
        _gas: &mut GasMeter,
    ) -> Result<Vec<u8>, ExecutionAbort> {
        // Verification and instrumentation are the host's concern; the
        // scripted executor stores modules as-is.
        Ok(module.to_vec())
    }
}
