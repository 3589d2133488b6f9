//! Adapters for the node ports.

mod time;

pub use time::{FixedTimeSource, SystemTimeSource};
