//! # st-03-state-store
//!
//! State Store subsystem for Strata-Chain: four logical tries composed
//! into one versioned state.
//!
//! | trie | key | value |
//! |------|-----|-------|
//! | responses | transaction reference | marshalled response |
//! | requests  | transaction reference | marshalled request |
//! | histories | storage reference | newest-first transaction references |
//! | info      | well-known keys | manifest pointer, consensus snapshot, commit counter |
//!
//! A committed state is identified by a [`StateId`]: the four root hashes
//! plus the commit counter. Reads against a checkout see exactly that
//! snapshot. Mutation happens only through a [`StoreTransformation`],
//! which stages the effects of a batch of transactions and commits them
//! atomically into a new state.

pub mod errors;
pub mod state_id;
pub mod store;
pub mod transformation;
pub mod view;

pub use errors::StoreError;
pub use state_id::StateId;
pub use store::Store;
pub use transformation::StoreTransformation;
pub use view::{ObjectState, StateView};
