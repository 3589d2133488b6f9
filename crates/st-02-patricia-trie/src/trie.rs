//! # The Persistent Trie
//!
//! Every mutation writes fresh nodes into the key-value store and moves the
//! root; nothing is modified in place, so any root ever produced keeps
//! resolving as long as its nodes survive reclamation.
//!
//! Each record is stored as `[commit tag u64 BE][payload]`. The tag is the
//! commit number current when the record was first written; it stays
//! outside the hashed preimage, so identical logical content always hashes
//! to the same record whatever commit wrote it. A reclamation pass uses the
//! tags to drop records of retired roots older than a horizon.

use crate::errors::TrieError;
use crate::nibbles::Nibbles;
use crate::node::{NodeHash, TrieNode, ValueRef};
use shared_crypto::{Hasher, DIGEST_LEN};
use shared_types::Marshallable;
use st_01_key_value::KeyValueStore;
use std::collections::HashSet;
use std::sync::Arc;

const RECORD_TAG_LEN: usize = 8;

/// A Merkle-Patricia trie rooted at one hash, layered over a key-value
/// store.
///
/// Keys are hashed once with the node hasher before traversal, so all
/// paths have the same nibble length and the trie stays balanced under
/// adversarial keys.
pub struct PatriciaTrie<'a> {
    kvs: &'a dyn KeyValueStore,
    hasher: Arc<dyn Hasher>,
    root: Option<NodeHash>,
    commit_tag: u64,
}

impl<'a> PatriciaTrie<'a> {
    /// Creates an empty trie whose new records will carry `commit_tag`.
    #[must_use]
    pub fn new(kvs: &'a dyn KeyValueStore, hasher: Arc<dyn Hasher>, commit_tag: u64) -> Self {
        Self {
            kvs,
            hasher,
            root: None,
            commit_tag,
        }
    }

    /// Opens a handle rooted at a historical root, for reads.
    #[must_use]
    pub fn checkout_at(
        kvs: &'a dyn KeyValueStore,
        hasher: Arc<dyn Hasher>,
        root: Option<NodeHash>,
    ) -> Self {
        Self {
            kvs,
            hasher,
            root,
            commit_tag: 0,
        }
    }

    /// Opens a writable handle continuing from a historical root.
    #[must_use]
    pub fn continue_from(
        kvs: &'a dyn KeyValueStore,
        hasher: Arc<dyn Hasher>,
        root: Option<NodeHash>,
        commit_tag: u64,
    ) -> Self {
        Self {
            kvs,
            hasher,
            root,
            commit_tag,
        }
    }

    /// The current root; `None` for the empty mapping.
    #[must_use]
    pub fn root(&self) -> Option<NodeHash> {
        self.root
    }

    // =========================================================================
    // READ PATH
    // =========================================================================

    /// Looks up the value stored under `key`. Never mutates.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        let digest = self.hasher.hash(key);
        let nibbles = Nibbles::from_bytes(&digest);

        let mut current = match self.root {
            Some(hash) => hash,
            None => return Ok(None),
        };
        let mut offset = 0usize;

        loop {
            match self.load_node(&current)? {
                TrieNode::Leaf { path, value } => {
                    return if nibbles.0[offset..] == path.0[..] {
                        Ok(Some(self.load_value(&value)?))
                    } else {
                        Ok(None)
                    };
                }
                TrieNode::Extension { path, child } => {
                    if nibbles.slice(offset).starts_with(&path) {
                        offset += path.len();
                        current = child;
                    } else {
                        return Ok(None);
                    }
                }
                TrieNode::Branch { children, value } => {
                    if offset == nibbles.len() {
                        return match value {
                            Some(value) => Ok(Some(self.load_value(&value)?)),
                            None => Ok(None),
                        };
                    }
                    match children[nibbles.at(offset) as usize] {
                        Some(child) => {
                            offset += 1;
                            current = child;
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    // =========================================================================
    // WRITE PATH
    // =========================================================================

    /// Binds `key` to `value`, producing a new root.
    ///
    /// Identical key-value maps yield identical roots regardless of
    /// insertion order, and a `put` that does not change the mapping
    /// leaves the root unchanged.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        let digest = self.hasher.hash(key);
        let nibbles = Nibbles::from_bytes(&digest);
        let value = self.store_value(value)?;
        let new_root = self.insert_at(self.root, &nibbles.0, &value)?;
        self.root = Some(new_root);
        Ok(())
    }

    fn insert_at(
        &mut self,
        node: Option<NodeHash>,
        path: &[u8],
        value: &ValueRef,
    ) -> Result<NodeHash, TrieError> {
        let Some(hash) = node else {
            return self.store_node(&TrieNode::Leaf {
                path: Nibbles(path.to_vec()),
                value: value.clone(),
            });
        };

        match self.load_node(&hash)? {
            TrieNode::Leaf { path: leaf_path, value: leaf_value } => {
                if leaf_path.0 == path {
                    // Same key: replace the value.
                    return self.store_node(&TrieNode::Leaf {
                        path: leaf_path,
                        value: value.clone(),
                    });
                }
                let common = leaf_path.common_prefix_len(&Nibbles(path.to_vec()));
                let branch = self.branch_of_two(
                    &leaf_path.0[common..],
                    leaf_value,
                    &path[common..],
                    value.clone(),
                )?;
                self.wrap_extension(&path[..common], branch)
            }

            TrieNode::Extension { path: ext_path, child } => {
                let common = ext_path.common_prefix_len(&Nibbles(path.to_vec()));
                if common == ext_path.len() {
                    // Fully inside the compressed run: descend.
                    let new_child = self.insert_at(Some(child), &path[common..], value)?;
                    return self.store_node(&TrieNode::Extension {
                        path: ext_path,
                        child: new_child,
                    });
                }

                // The run splits: build a branch at the divergence point.
                let mut children: [Option<NodeHash>; 16] = [None; 16];
                let mut branch_value: Option<ValueRef> = None;

                let ext_rest = &ext_path.0[common..];
                let ext_child = if ext_rest.len() == 1 {
                    child
                } else {
                    self.store_node(&TrieNode::Extension {
                        path: Nibbles(ext_rest[1..].to_vec()),
                        child,
                    })?
                };
                children[ext_rest[0] as usize] = Some(ext_child);

                let new_rest = &path[common..];
                if new_rest.is_empty() {
                    branch_value = Some(value.clone());
                } else {
                    let leaf = self.store_node(&TrieNode::Leaf {
                        path: Nibbles(new_rest[1..].to_vec()),
                        value: value.clone(),
                    })?;
                    children[new_rest[0] as usize] = Some(leaf);
                }

                let branch = self.store_node(&TrieNode::Branch {
                    children: Box::new(children),
                    value: branch_value,
                })?;
                self.wrap_extension(&path[..common], branch)
            }

            TrieNode::Branch { mut children, value: branch_value } => {
                if path.is_empty() {
                    return self.store_node(&TrieNode::Branch {
                        children,
                        value: Some(value.clone()),
                    });
                }
                let slot = path[0] as usize;
                let new_child = self.insert_at(children[slot], &path[1..], value)?;
                children[slot] = Some(new_child);
                self.store_node(&TrieNode::Branch {
                    children,
                    value: branch_value,
                })
            }
        }
    }

    /// Builds the branch holding two diverging suffixes. The suffixes
    /// already had their common prefix removed, so they differ at their
    /// first nibble (or one of them is empty).
    fn branch_of_two(
        &mut self,
        rest_a: &[u8],
        value_a: ValueRef,
        rest_b: &[u8],
        value_b: ValueRef,
    ) -> Result<NodeHash, TrieError> {
        let mut children: [Option<NodeHash>; 16] = [None; 16];
        let mut branch_value: Option<ValueRef> = None;

        for (rest, value) in [(rest_a, value_a), (rest_b, value_b)] {
            if rest.is_empty() {
                branch_value = Some(value);
            } else {
                let leaf = self.store_node(&TrieNode::Leaf {
                    path: Nibbles(rest[1..].to_vec()),
                    value,
                })?;
                children[rest[0] as usize] = Some(leaf);
            }
        }

        self.store_node(&TrieNode::Branch {
            children: Box::new(children),
            value: branch_value,
        })
    }

    fn wrap_extension(&mut self, prefix: &[u8], child: NodeHash) -> Result<NodeHash, TrieError> {
        if prefix.is_empty() {
            Ok(child)
        } else {
            self.store_node(&TrieNode::Extension {
                path: Nibbles(prefix.to_vec()),
                child,
            })
        }
    }

    // =========================================================================
    // RECORDS
    // =========================================================================

    fn store_node(&mut self, node: &TrieNode) -> Result<NodeHash, TrieError> {
        let payload = node.to_bytes();
        let hash = self.hasher.hash(&payload);
        self.kvs.put(&hash, &make_record(self.commit_tag, &payload))?;
        Ok(hash)
    }

    fn load_node(&self, hash: &NodeHash) -> Result<TrieNode, TrieError> {
        let record = self
            .kvs
            .get(hash)?
            .ok_or_else(|| TrieError::Integrity {
                missing: hex::encode(hash),
            })?;
        Ok(TrieNode::from_bytes(record_payload(&record)?)?)
    }

    fn store_value(&mut self, value: &[u8]) -> Result<ValueRef, TrieError> {
        if value.len() <= DIGEST_LEN {
            return Ok(ValueRef::Inline(value.to_vec()));
        }
        let hash = self.hasher.hash(value);
        self.kvs.put(&hash, &make_record(self.commit_tag, value))?;
        Ok(ValueRef::Hashed(hash))
    }

    fn load_value(&self, value: &ValueRef) -> Result<Vec<u8>, TrieError> {
        match value {
            ValueRef::Inline(bytes) => Ok(bytes.clone()),
            ValueRef::Hashed(hash) => {
                let record = self
                    .kvs
                    .get(hash)?
                    .ok_or_else(|| TrieError::Integrity {
                        missing: hex::encode(hash),
                    })?;
                Ok(record_payload(&record)?.to_vec())
            }
        }
    }
}

fn make_record(tag: u64, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_TAG_LEN + payload.len());
    record.extend_from_slice(&tag.to_be_bytes());
    record.extend_from_slice(payload);
    record
}

fn record_payload(record: &[u8]) -> Result<&[u8], TrieError> {
    if record.len() < RECORD_TAG_LEN {
        return Err(TrieError::Integrity {
            missing: "record shorter than its commit tag".to_string(),
        });
    }
    Ok(&record[RECORD_TAG_LEN..])
}

fn record_tag(record: &[u8]) -> Result<u64, TrieError> {
    if record.len() < RECORD_TAG_LEN {
        return Err(TrieError::Integrity {
            missing: "record shorter than its commit tag".to_string(),
        });
    }
    Ok(u64::from_be_bytes(record[..RECORD_TAG_LEN].try_into().unwrap()))
}

// =============================================================================
// RECLAMATION
// =============================================================================

/// Removes records reachable from `obsolete_roots` but from none of
/// `live_roots`, provided their commit tag is older than `horizon`.
/// Returns the number of removed records.
///
/// The policy choosing `horizon` (typically `commits - retention_horizon`)
/// belongs to the operator; this is only the mechanism.
pub fn reclaim_older_than(
    kvs: &dyn KeyValueStore,
    obsolete_roots: &[NodeHash],
    live_roots: &[NodeHash],
    horizon: u64,
) -> Result<usize, TrieError> {
    let mut live = HashSet::new();
    for root in live_roots {
        collect_reachable(kvs, root, &mut live)?;
    }

    let mut removed = 0usize;
    let mut seen = HashSet::new();
    let mut stack: Vec<(NodeHash, bool)> = obsolete_roots
        .iter()
        .map(|hash| (*hash, true))
        .collect();

    while let Some((hash, is_node)) = stack.pop() {
        if !seen.insert(hash) || live.contains(&hash) {
            continue;
        }
        let Some(record) = kvs.get(&hash)? else {
            continue; // already reclaimed
        };

        if is_node {
            let node = TrieNode::from_bytes(record_payload(&record)?)?;
            push_references(&node, &mut stack);
        }

        if record_tag(&record)? < horizon {
            kvs.remove(&hash)?;
            removed += 1;
        }
    }

    tracing::debug!("[st-02] reclaimed {removed} trie records below horizon {horizon}");
    Ok(removed)
}

fn collect_reachable(
    kvs: &dyn KeyValueStore,
    root: &NodeHash,
    out: &mut HashSet<NodeHash>,
) -> Result<(), TrieError> {
    let mut stack: Vec<(NodeHash, bool)> = vec![(*root, true)];
    while let Some((hash, is_node)) = stack.pop() {
        if !out.insert(hash) {
            continue;
        }
        if !is_node {
            continue;
        }
        let Some(record) = kvs.get(&hash)? else {
            return Err(TrieError::Integrity {
                missing: hex::encode(hash),
            });
        };
        let node = TrieNode::from_bytes(record_payload(&record)?)?;
        push_references(&node, &mut stack);
    }
    Ok(())
}

fn push_references(node: &TrieNode, stack: &mut Vec<(NodeHash, bool)>) {
    match node {
        TrieNode::Leaf { value, .. } => {
            if let ValueRef::Hashed(hash) = value {
                stack.push((*hash, false));
            }
        }
        TrieNode::Extension { child, .. } => stack.push((*child, true)),
        TrieNode::Branch { children, value } => {
            for child in children.iter().flatten() {
                stack.push((*child, true));
            }
            if let Some(ValueRef::Hashed(hash)) = value {
                stack.push((*hash, false));
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
