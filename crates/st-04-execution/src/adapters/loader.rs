//! Class loading for executors that do their own module resolution.

use crate::errors::ExecutionAbort;
use crate::ports::{ClassLoader, ClassLoaderProvider};
use shared_types::TransactionReference;
use st_03_state_store::StateView;
use std::sync::Arc;

/// A loader that only records which module it serves. Executors that keep
/// their own module registry need nothing more from the pipeline.
pub struct OpaqueClassLoader {
    classpath: TransactionReference,
}

impl ClassLoader for OpaqueClassLoader {
    fn classpath(&self) -> &TransactionReference {
        &self.classpath
    }
}

/// Provider handing out [`OpaqueClassLoader`]s.
#[derive(Default)]
pub struct OpaqueClassLoaderProvider;

impl ClassLoaderProvider for OpaqueClassLoaderProvider {
    fn load(
        &self,
        classpath: &TransactionReference,
        _state: &dyn StateView,
    ) -> Result<Arc<dyn ClassLoader>, ExecutionAbort> {
        Ok(Arc::new(OpaqueClassLoader {
            classpath: *classpath,
        }))
    }
}
