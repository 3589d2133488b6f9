//! Node-local configuration.
//!
//! These knobs are local to one node process; everything chain-wide lives
//! in the consensus snapshot instead.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of one node process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalNodeConfig {
    /// Directory for the file-backed store, when one is used.
    pub chain_dir: Option<PathBuf>,

    /// Upper bound on requests folded into one commit.
    pub max_batch_size: usize,

    /// How long `add` waits for a response before returning a timeout.
    pub add_timeout_ms: u64,

    /// Size of the read pool: concurrent snapshot reads served at once.
    pub worker_threads: usize,
}

impl Default for LocalNodeConfig {
    fn default() -> Self {
        Self {
            chain_dir: None,
            max_batch_size: 64,
            add_timeout_ms: 30_000,
            worker_threads: 4,
        }
    }
}

impl LocalNodeConfig {
    /// The `add` timeout as a [`Duration`].
    #[must_use]
    pub fn add_timeout(&self) -> Duration {
        Duration::from_millis(self.add_timeout_ms)
    }
}
