//! Adapters for the execution ports: an opaque class loader for executors
//! that resolve modules themselves, and a scripted executor for tests.

mod loader;
mod scripted;

pub use loader::{OpaqueClassLoader, OpaqueClassLoaderProvider};
pub use scripted::{CallBehavior, ScriptedExecutor};
