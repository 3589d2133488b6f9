//! # st-05-node
//!
//! Node façade for Strata-Chain.
//!
//! ## Role in System
//!
//! - **Submission**: `post` (enqueue, return the reference) and `add`
//!   (post and wait, with a timeout)
//! - **Single-writer scheduling**: one task owns the current store
//!   transformation and delivers queued requests in order, batch by batch
//! - **Multi-reader paths**: snapshot reads against any committed state
//! - **Failure containment**: fatal store errors halt intake until an
//!   operator resumes from a known good state
//!
//! The façade owns no policy: consensus parameters come from the
//! snapshot, execution from the plugged [`st_04_execution`] ports.

pub mod adapters;
pub mod config;
pub mod errors;
pub mod node;
pub mod ports;

pub use adapters::{FixedTimeSource, SystemTimeSource};
pub use config::LocalNodeConfig;
pub use errors::NodeError;
pub use node::Node;
pub use ports::{NodeApi, TimeSource};
