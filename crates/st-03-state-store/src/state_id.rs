//! # State Identity
//!
//! A committed state is named by its four trie roots plus the commit
//! counter. Two identifiers are interchangeable exactly when they are
//! bit-identical.

use serde::{Deserialize, Serialize};
use shared_types::{Marshallable, MarshalError, MarshalReader, MarshalWriter};
use st_02_patricia_trie::NodeHash;
use std::fmt;

/// Identity of a committed store snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StateId {
    /// Root of the responses trie, absent while empty.
    pub responses: Option<NodeHash>,
    /// Root of the requests trie.
    pub requests: Option<NodeHash>,
    /// Root of the histories trie.
    pub histories: Option<NodeHash>,
    /// Root of the info trie.
    pub info: Option<NodeHash>,
    /// Number of commits that produced this state.
    pub commits: u64,
}

impl StateId {
    /// The identity of the pristine, never-committed store.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            responses: None,
            requests: None,
            histories: None,
            info: None,
            commits: 0,
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn short(root: &Option<NodeHash>) -> String {
            match root {
                Some(hash) => hex::encode(&hash[..4]),
                None => "-".to_string(),
            }
        }
        write!(
            f,
            "state#{}[{}/{}/{}/{}]",
            self.commits,
            short(&self.responses),
            short(&self.requests),
            short(&self.histories),
            short(&self.info)
        )
    }
}

fn write_root(w: &mut MarshalWriter, root: &Option<NodeHash>) {
    match root {
        None => w.write_u8(0),
        Some(hash) => {
            w.write_u8(1);
            w.write_fixed(hash);
        }
    }
}

fn read_root(r: &mut MarshalReader<'_>) -> Result<Option<NodeHash>, MarshalError> {
    match r.read_u8()? {
        0 => Ok(None),
        1 => Ok(Some(r.read_fixed(32)?.try_into().unwrap())),
        other => Err(MarshalError::UnknownSelector {
            context: "state id root flag",
            selector: other,
        }),
    }
}

impl Marshallable for StateId {
    fn marshal(&self, w: &mut MarshalWriter) {
        write_root(w, &self.responses);
        write_root(w, &self.requests);
        write_root(w, &self.histories);
        write_root(w, &self.info);
        w.write_u64(self.commits);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            responses: read_root(r)?,
            requests: read_root(r)?,
            histories: read_root(r)?,
            info: read_root(r)?,
            commits: r.read_u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id_roundtrip() {
        let id = StateId::empty();
        assert_eq!(StateId::from_bytes(&id.to_bytes()).unwrap(), id);
    }

    #[test]
    fn test_id_roundtrip_with_roots() {
        let id = StateId {
            responses: Some([1; 32]),
            requests: None,
            histories: Some([3; 32]),
            info: Some([4; 32]),
            commits: 17,
        };
        assert_eq!(StateId::from_bytes(&id.to_bytes()).unwrap(), id);
    }
}
