//! # The Committed Store
//!
//! An immutable handle over one committed state. All reads resolve
//! through the four tries at the roots named by the handle's [`StateId`];
//! concurrent readers on different snapshots never interfere.

use crate::errors::StoreError;
use crate::state_id::StateId;
use crate::transformation::StoreTransformation;
use crate::view::StateView;
use shared_crypto::Hasher;
use shared_types::{
    ConsensusConfig, Marshallable, MarshalReader, MarshalWriter, Request, Response,
    StorageReference, TransactionReference,
};
use st_01_key_value::{KeyValueStore, RootName};
use st_02_patricia_trie::{NodeHash, PatriciaTrie};
use std::sync::{Arc, OnceLock};

/// Well-known keys of the info trie.
pub(crate) const MANIFEST_KEY: &[u8] = b"manifest";
pub(crate) const CONSENSUS_KEY: &[u8] = b"consensus";
pub(crate) const COMMITS_KEY: &[u8] = b"commits";

/// An immutable store handle at one committed state.
#[derive(Clone)]
pub struct Store {
    kvs: Arc<dyn KeyValueStore>,
    hasher: Arc<dyn Hasher>,
    id: StateId,
    consensus_cache: Arc<OnceLock<Option<ConsensusConfig>>>,
}

impl Store {
    /// Opens the store at the roots currently named in the key-value
    /// store; a pristine back-end yields the empty state.
    pub fn open(kvs: Arc<dyn KeyValueStore>, hasher: Arc<dyn Hasher>) -> Result<Self, StoreError> {
        let responses = read_named_root(kvs.as_ref(), RootName::Responses)?;
        let requests = read_named_root(kvs.as_ref(), RootName::Requests)?;
        let histories = read_named_root(kvs.as_ref(), RootName::Histories)?;
        let info = read_named_root(kvs.as_ref(), RootName::Info)?;

        let mut store = Self {
            kvs,
            hasher,
            id: StateId {
                responses,
                requests,
                histories,
                info,
                commits: 0,
            },
            consensus_cache: Arc::new(OnceLock::new()),
        };
        store.id.commits = store.read_commit_counter()?;
        tracing::info!("[st-03] opened store at {}", store.id);
        Ok(store)
    }

    /// Opens a handle at an explicit historical state. Reads see exactly
    /// that snapshot.
    #[must_use]
    pub fn checkout_at(&self, id: StateId) -> Self {
        Self {
            kvs: Arc::clone(&self.kvs),
            hasher: Arc::clone(&self.hasher),
            id,
            consensus_cache: Arc::new(OnceLock::new()),
        }
    }

    /// The identity of this snapshot.
    #[must_use]
    pub fn id(&self) -> &StateId {
        &self.id
    }

    /// Starts drafting changes on top of this snapshot.
    #[must_use]
    pub fn begin_transformation(&self, consensus: ConsensusConfig, now: u64) -> StoreTransformation {
        StoreTransformation::new(self.clone(), consensus, now)
    }

    /// The reference a request is recorded under: the node hash of its
    /// marshalled bytes.
    #[must_use]
    pub fn reference_of(&self, request: &Request) -> TransactionReference {
        TransactionReference::new(self.hasher.hash(&request.to_bytes()))
    }

    pub(crate) fn kvs(&self) -> &Arc<dyn KeyValueStore> {
        &self.kvs
    }

    pub(crate) fn hasher(&self) -> &Arc<dyn Hasher> {
        &self.hasher
    }

    pub(crate) fn trie_at(&self, root: Option<NodeHash>) -> PatriciaTrie<'_> {
        PatriciaTrie::checkout_at(self.kvs.as_ref(), Arc::clone(&self.hasher), root)
    }

    fn read_commit_counter(&self) -> Result<u64, StoreError> {
        let info = self.trie_at(self.id.info);
        match info.get(COMMITS_KEY)? {
            None => Ok(0),
            Some(bytes) => {
                let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corrupted("commit counter record has wrong width".to_string())
                })?;
                Ok(u64::from_be_bytes(array))
            }
        }
    }
}

fn read_named_root(
    kvs: &dyn KeyValueStore,
    name: RootName,
) -> Result<Option<NodeHash>, StoreError> {
    match kvs.get_root(name)? {
        None => Ok(None),
        Some(bytes) => {
            let root: NodeHash = bytes.as_slice().try_into().map_err(|_| {
                StoreError::Corrupted(format!("root {} has wrong width", name.as_str()))
            })?;
            Ok(Some(root))
        }
    }
}

/// Canonical encoding of a history: compact count, then the references
/// newest first.
pub(crate) fn encode_history(history: &[TransactionReference]) -> Vec<u8> {
    let mut w = MarshalWriter::new();
    w.write_array(history);
    w.into_bytes()
}

pub(crate) fn decode_history(bytes: &[u8]) -> Result<Vec<TransactionReference>, StoreError> {
    let mut r = MarshalReader::new(bytes);
    let history = r.read_array()?;
    r.expect_end()?;
    Ok(history)
}

impl StateView for Store {
    fn get_response(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Response>, StoreError> {
        let trie = self.trie_at(self.id.responses);
        match trie.get(reference.as_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(Response::from_bytes(&bytes)?)),
        }
    }

    fn get_request(&self, reference: &TransactionReference) -> Result<Option<Request>, StoreError> {
        let trie = self.trie_at(self.id.requests);
        match trie.get(reference.as_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(Request::from_bytes(&bytes)?)),
        }
    }

    fn get_history(
        &self,
        object: &StorageReference,
    ) -> Result<Vec<TransactionReference>, StoreError> {
        let trie = self.trie_at(self.id.histories);
        match trie.get(&object.to_bytes())? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_history(&bytes),
        }
    }

    fn get_manifest(&self) -> Result<Option<StorageReference>, StoreError> {
        let trie = self.trie_at(self.id.info);
        match trie.get(MANIFEST_KEY)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(StorageReference::from_bytes(&bytes)?)),
        }
    }

    fn get_consensus(&self) -> Result<Option<ConsensusConfig>, StoreError> {
        if let Some(cached) = self.consensus_cache.get() {
            return Ok(cached.clone());
        }
        let trie = self.trie_at(self.id.info);
        let consensus = match trie.get(CONSENSUS_KEY)? {
            None => None,
            Some(bytes) => Some(ConsensusConfig::from_bytes(&bytes)?),
        };
        let _ = self.consensus_cache.set(consensus.clone());
        Ok(consensus)
    }
}
