//! # st-01-key-value
//!
//! Key-Value Store subsystem for Strata-Chain.
//!
//! ## Role in System
//!
//! - **Flat byte store**: maps fixed-length hash keys to arbitrary bytes
//! - **Content-addressed**: a key is always the hash of its value, so a
//!   repeated `put` rewrites identical bytes
//! - **Named roots**: a small fixed namespace of entry points
//!   (responses, requests, histories, info)
//! - **Transactional boundary**: `begin`/`commit`/`rollback` group writes
//!   so that the four roots move atomically or not at all
//!
//! Durability is the adapter's concern: the in-memory adapter has none,
//! the file-backed adapter persists on commit.

pub mod adapters;
pub mod errors;
pub mod ports;

pub use adapters::{FileBackedKvs, InMemoryKvs};
pub use errors::KvsError;
pub use ports::{KeyValueStore, RootName};
