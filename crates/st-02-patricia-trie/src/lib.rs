//! # st-02-patricia-trie
//!
//! Patricia Trie subsystem for Strata-Chain: a persistent Merkle-Patricia
//! trie whose nodes are content-addressed records in the key-value store.
//!
//! ## Properties
//!
//! - **Persistent**: `put` produces a new root; every historical root stays
//!   a valid read-only entry point while its nodes remain in the store.
//! - **Deterministic**: identical key-value maps yield identical roots,
//!   whatever the insertion order; a `put` that does not change the
//!   mapping preserves the root.
//! - **Content-addressed**: a node's identity is the hash of its canonical
//!   marshalling; structural sharing between versions is free.
//!
//! ## Node Types
//!
//! - **Leaf**: remaining path + value (inline, or hashed out of line)
//! - **Extension**: shared prefix + single child
//! - **Branch**: 16 children + optional value
//! - **Empty** is the absence of a root.
//!
//! Keys are hashed once with the node hasher and split into 4-bit nibbles,
//! most-significant first; paths are stored hex-prefix encoded.

pub mod errors;
pub mod nibbles;
pub mod node;
pub mod trie;

pub use errors::TrieError;
pub use nibbles::Nibbles;
pub use node::{NodeHash, TrieNode, ValueRef};
pub use trie::{reclaim_older_than, PatriciaTrie};
