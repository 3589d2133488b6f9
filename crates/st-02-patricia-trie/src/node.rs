//! # Trie Nodes
//!
//! The three stored node kinds and their canonical marshalling. A node's
//! identity is the node hash of these bytes: no variant bits, no interior
//! padding, branches always carry 16 slots in order 0..15.
//!
//! Values longer than the digest width live out of line as separate
//! records keyed by their own hash; shorter values inline into the node.

use crate::nibbles::Nibbles;
use shared_types::{Marshallable, MarshalError, MarshalReader, MarshalWriter};
use shared_crypto::DIGEST_LEN;

/// Hash identifying a trie node or out-of-line value record.
pub type NodeHash = [u8; DIGEST_LEN];

const SEL_LEAF: u8 = 0;
const SEL_EXTENSION: u8 = 1;
const SEL_BRANCH: u8 = 2;

const VALUE_INLINE: u8 = 0;
const VALUE_HASHED: u8 = 1;

/// A stored value: inline bytes, or the hash of an out-of-line record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueRef {
    /// Value bytes no longer than the digest width, stored in the node.
    Inline(Vec<u8>),
    /// Hash of a separate record holding the value bytes.
    Hashed(NodeHash),
}

impl ValueRef {
    fn marshal(&self, w: &mut MarshalWriter) {
        match self {
            ValueRef::Inline(bytes) => {
                w.write_u8(VALUE_INLINE);
                w.write_bytes(bytes);
            }
            ValueRef::Hashed(hash) => {
                w.write_u8(VALUE_HASHED);
                w.write_fixed(hash);
            }
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        match r.read_u8()? {
            VALUE_INLINE => {
                let bytes = r.read_bytes()?;
                if bytes.len() > DIGEST_LEN {
                    return Err(MarshalError::NonCanonical("inline value longer than digest"));
                }
                Ok(ValueRef::Inline(bytes))
            }
            VALUE_HASHED => Ok(ValueRef::Hashed(read_hash(r)?)),
            other => Err(MarshalError::UnknownSelector {
                context: "trie value reference",
                selector: other,
            }),
        }
    }
}

/// A node of the Merkle-Patricia trie. Empty tries have no node at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Terminal node: remaining path plus the value.
    Leaf { path: Nibbles, value: ValueRef },

    /// Shared-prefix compression: path plus the hash of the only child.
    Extension { path: Nibbles, child: NodeHash },

    /// 16-way fan-out plus an optional value for keys ending here.
    Branch {
        children: Box<[Option<NodeHash>; 16]>,
        value: Option<ValueRef>,
    },
}

impl Marshallable for TrieNode {
    fn marshal(&self, w: &mut MarshalWriter) {
        match self {
            TrieNode::Leaf { path, value } => {
                w.write_u8(SEL_LEAF);
                w.write_bytes(&path.encode_hex_prefix(true));
                value.marshal(w);
            }
            TrieNode::Extension { path, child } => {
                w.write_u8(SEL_EXTENSION);
                w.write_bytes(&path.encode_hex_prefix(false));
                w.write_fixed(child);
            }
            TrieNode::Branch { children, value } => {
                w.write_u8(SEL_BRANCH);
                for child in children.iter() {
                    match child {
                        None => w.write_u8(0),
                        Some(hash) => {
                            w.write_u8(1);
                            w.write_fixed(hash);
                        }
                    }
                }
                match value {
                    None => w.write_u8(0),
                    Some(value) => {
                        w.write_u8(1);
                        value.marshal(w);
                    }
                }
            }
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        match r.read_u8()? {
            SEL_LEAF => {
                let encoded = r.read_bytes()?;
                let (path, is_leaf) = Nibbles::decode_hex_prefix(&encoded)?;
                if !is_leaf {
                    return Err(MarshalError::NonCanonical("leaf path flagged as extension"));
                }
                Ok(TrieNode::Leaf {
                    path,
                    value: ValueRef::unmarshal(r)?,
                })
            }
            SEL_EXTENSION => {
                let encoded = r.read_bytes()?;
                let (path, is_leaf) = Nibbles::decode_hex_prefix(&encoded)?;
                if is_leaf {
                    return Err(MarshalError::NonCanonical("extension path flagged as leaf"));
                }
                Ok(TrieNode::Extension {
                    path,
                    child: read_hash(r)?,
                })
            }
            SEL_BRANCH => {
                let mut children: [Option<NodeHash>; 16] = [None; 16];
                for slot in children.iter_mut() {
                    *slot = match r.read_u8()? {
                        0 => None,
                        1 => Some(read_hash(r)?),
                        other => {
                            return Err(MarshalError::UnknownSelector {
                                context: "branch slot flag",
                                selector: other,
                            })
                        }
                    };
                }
                let value = match r.read_u8()? {
                    0 => None,
                    1 => Some(ValueRef::unmarshal(r)?),
                    other => {
                        return Err(MarshalError::UnknownSelector {
                            context: "branch value flag",
                            selector: other,
                        })
                    }
                };
                Ok(TrieNode::Branch {
                    children: Box::new(children),
                    value,
                })
            }
            other => Err(MarshalError::UnknownSelector {
                context: "trie node",
                selector: other,
            }),
        }
    }
}

fn read_hash(r: &mut MarshalReader<'_>) -> Result<NodeHash, MarshalError> {
    Ok(r.read_fixed(DIGEST_LEN)?.try_into().unwrap())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_roundtrip_every_kind() {
        let mut children: [Option<NodeHash>; 16] = [None; 16];
        children[3] = Some([7; 32]);
        children[15] = Some([8; 32]);

        let nodes = vec![
            TrieNode::Leaf {
                path: Nibbles(vec![1, 2, 3]),
                value: ValueRef::Inline(vec![0xAA, 0xBB]),
            },
            TrieNode::Leaf {
                path: Nibbles(vec![]),
                value: ValueRef::Hashed([5; 32]),
            },
            TrieNode::Extension {
                path: Nibbles(vec![0, 15]),
                child: [9; 32],
            },
            TrieNode::Branch {
                children: Box::new(children),
                value: Some(ValueRef::Inline(vec![1])),
            },
        ];

        for node in nodes {
            let decoded = TrieNode::from_bytes(&node.to_bytes()).unwrap();
            assert_eq!(decoded, node);
        }
    }

    #[test]
    fn test_marshalling_is_deterministic() {
        let node = TrieNode::Extension {
            path: Nibbles(vec![4, 4, 4]),
            child: [2; 32],
        };
        assert_eq!(node.to_bytes(), node.clone().to_bytes());
    }

    #[test]
    fn test_mismatched_path_flag_rejected() {
        let leaf = TrieNode::Leaf {
            path: Nibbles(vec![1]),
            value: ValueRef::Inline(vec![]),
        };
        let mut bytes = leaf.to_bytes();
        // Rewrite the selector to extension; the leaf-flagged path must
        // now fail to decode.
        bytes[0] = 1;
        assert!(TrieNode::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_oversized_inline_value_rejected() {
        let mut w = MarshalWriter::new();
        w.write_u8(0); // leaf
        w.write_bytes(&Nibbles(vec![1, 2]).encode_hex_prefix(true));
        w.write_u8(0); // inline
        w.write_bytes(&[0u8; 33]);
        assert!(TrieNode::from_bytes(&w.into_bytes()).is_err());
    }
}
