//! # Store Transformation
//!
//! The mutable, short-lived draft of the next state. A transformation
//! starts from a committed store, accumulates the `(request, response)`
//! pairs of one batch together with the history prepends they imply, and
//! either commits into a fresh state or abandons without trace.
//!
//! Within the batch, later requests read through the staged maps first,
//! so they observe the effects of earlier ones before anything reaches
//! the tries.

use crate::errors::StoreError;
use crate::state_id::StateId;
use crate::store::{self, Store, COMMITS_KEY, CONSENSUS_KEY, MANIFEST_KEY};
use crate::view::StateView;
use shared_types::{
    ConsensusConfig, Marshallable, Request, Response, StorageReference, TransactionReference,
};
use st_02_patricia_trie::{NodeHash, PatriciaTrie};
use std::collections::BTreeMap;

/// A draft of the next committed state.
pub struct StoreTransformation {
    base: Store,
    consensus: ConsensusConfig,
    consensus_dirty: bool,
    now: u64,
    staged_requests: BTreeMap<TransactionReference, Request>,
    staged_responses: BTreeMap<TransactionReference, Response>,
    /// Newest-first prepends per object; the full history is these
    /// followed by whatever the base store already has.
    staged_histories: BTreeMap<StorageReference, Vec<TransactionReference>>,
    staged_manifest: Option<StorageReference>,
    deliver_count: u64,
}

impl StoreTransformation {
    pub(crate) fn new(base: Store, consensus: ConsensusConfig, now: u64) -> Self {
        Self {
            base,
            consensus,
            consensus_dirty: false,
            now,
            staged_requests: BTreeMap::new(),
            staged_responses: BTreeMap::new(),
            staged_histories: BTreeMap::new(),
            staged_manifest: None,
            deliver_count: 0,
        }
    }

    /// The state this draft started from.
    #[must_use]
    pub fn base_id(&self) -> &StateId {
        self.base.id()
    }

    /// The timestamp the consensus collaborator assigned to this batch.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// The consensus parameters in force for this batch.
    #[must_use]
    pub fn consensus(&self) -> &ConsensusConfig {
        &self.consensus
    }

    /// The reference a request is recorded under.
    #[must_use]
    pub fn reference_of(&self, request: &Request) -> TransactionReference {
        self.base.reference_of(request)
    }

    /// Requests recorded so far in this batch.
    #[must_use]
    pub fn deliver_count(&self) -> u64 {
        self.deliver_count
    }

    /// Replaces the consensus snapshot mid-batch; the new parameters are
    /// persisted on commit and govern subsequent deliveries.
    pub fn set_consensus(&mut self, consensus: ConsensusConfig) {
        self.consensus = consensus;
        self.consensus_dirty = true;
    }

    /// Stages the manifest pointer; allowed once, during initialization.
    pub fn set_manifest(&mut self, manifest: StorageReference) {
        self.staged_manifest = Some(manifest);
    }

    /// Records a delivered `(request, response)` pair and prepends the
    /// request's reference to the history of every object its response
    /// updates.
    ///
    /// Rejected requests must never reach this method: recording is what
    /// makes a transaction part of the chain.
    pub fn push(
        &mut self,
        reference: TransactionReference,
        request: Request,
        response: Response,
    ) {
        // One prepend per touched object, however many updates it got.
        let mut touched: Vec<StorageReference> = Vec::new();
        for update in response.updates() {
            if !touched.contains(update.object()) {
                touched.push(*update.object());
            }
        }
        for object in touched {
            self.staged_histories
                .entry(object)
                .or_default()
                .insert(0, reference);
        }

        self.staged_requests.insert(reference, request);
        self.staged_responses.insert(reference, response);
        self.deliver_count += 1;
    }

    /// Discards the draft; the base store is untouched.
    pub fn abandon(self) {
        tracing::debug!(
            "[st-03] abandoned transformation of {} after {} deliveries",
            self.base.id(),
            self.deliver_count
        );
    }

    /// Applies the staged writes to the four tries, in the fixed order
    /// responses, requests, histories, info, inside one key-value
    /// transaction, and returns the new state identity.
    ///
    /// On any error the key-value transaction is rolled back: the store
    /// keeps its previous roots and the draft is lost.
    pub fn commit(self) -> Result<StateId, StoreError> {
        let kvs = self.base.kvs().clone();
        kvs.begin()?;
        match self.apply() {
            Ok(id) => {
                kvs.commit()?;
                tracing::info!("[st-03] committed {id}");
                Ok(id)
            }
            Err(error) => {
                tracing::error!("[st-03] commit failed, rolling back: {error}");
                let _ = kvs.rollback();
                Err(error)
            }
        }
    }

    fn apply(&self) -> Result<StateId, StoreError> {
        let base_id = *self.base.id();
        let commits = base_id.commits + 1;
        let kvs = self.base.kvs();
        let hasher = self.base.hasher();

        // Responses.
        let mut responses = PatriciaTrie::continue_from(
            kvs.as_ref(),
            hasher.clone(),
            base_id.responses,
            commits,
        );
        for (reference, response) in &self.staged_responses {
            responses.put(reference.as_bytes(), &response.to_bytes())?;
        }

        // Requests.
        let mut requests = PatriciaTrie::continue_from(
            kvs.as_ref(),
            hasher.clone(),
            base_id.requests,
            commits,
        );
        for (reference, request) in &self.staged_requests {
            requests.put(reference.as_bytes(), &request.to_bytes())?;
        }

        // Histories: full list = staged prepends followed by the base's.
        let mut histories = PatriciaTrie::continue_from(
            kvs.as_ref(),
            hasher.clone(),
            base_id.histories,
            commits,
        );
        for (object, prepends) in &self.staged_histories {
            let mut full = prepends.clone();
            full.extend(self.base.get_history(object)?);
            histories.put(&object.to_bytes(), &store::encode_history(&full))?;
        }

        // Info: manifest, consensus, commit counter.
        let mut info =
            PatriciaTrie::continue_from(kvs.as_ref(), hasher.clone(), base_id.info, commits);
        if let Some(manifest) = &self.staged_manifest {
            info.put(MANIFEST_KEY, &manifest.to_bytes())?;
        }
        if self.consensus_dirty || self.base.get_consensus()?.is_none() {
            info.put(CONSENSUS_KEY, &self.consensus.to_bytes())?;
        }
        info.put(COMMITS_KEY, &commits.to_be_bytes())?;

        let id = StateId {
            responses: responses.root(),
            requests: requests.root(),
            histories: histories.root(),
            info: info.root(),
            commits,
        };
        set_roots(kvs.as_ref(), &id)?;
        Ok(id)
    }
}

fn set_roots(
    kvs: &dyn st_01_key_value::KeyValueStore,
    id: &StateId,
) -> Result<(), StoreError> {
    use st_01_key_value::RootName;
    let pairs: [(RootName, Option<NodeHash>); 4] = [
        (RootName::Responses, id.responses),
        (RootName::Requests, id.requests),
        (RootName::Histories, id.histories),
        (RootName::Info, id.info),
    ];
    for (name, root) in pairs {
        if let Some(root) = root {
            kvs.set_root(name, &root)?;
        }
    }
    Ok(())
}

impl StateView for StoreTransformation {
    fn get_response(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Response>, StoreError> {
        if let Some(response) = self.staged_responses.get(reference) {
            return Ok(Some(response.clone()));
        }
        self.base.get_response(reference)
    }

    fn get_request(&self, reference: &TransactionReference) -> Result<Option<Request>, StoreError> {
        if let Some(request) = self.staged_requests.get(reference) {
            return Ok(Some(request.clone()));
        }
        self.base.get_request(reference)
    }

    fn get_history(
        &self,
        object: &StorageReference,
    ) -> Result<Vec<TransactionReference>, StoreError> {
        let mut history = match self.staged_histories.get(object) {
            Some(prepends) => prepends.clone(),
            None => Vec::new(),
        };
        history.extend(self.base.get_history(object)?);
        Ok(history)
    }

    fn get_manifest(&self) -> Result<Option<StorageReference>, StoreError> {
        if let Some(manifest) = &self.staged_manifest {
            return Ok(Some(*manifest));
        }
        self.base.get_manifest()
    }

    fn get_consensus(&self) -> Result<Option<ConsensusConfig>, StoreError> {
        Ok(Some(self.consensus.clone()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::Sha256Hasher;
    use shared_types::{
        FieldSignature, GasCounts, StorageType, StorageValue, Update,
    };
    use st_01_key_value::InMemoryKvs;
    use std::sync::Arc;

    fn open_store() -> Store {
        Store::open(Arc::new(InMemoryKvs::new()), Arc::new(Sha256Hasher)).unwrap()
    }

    fn tx(tag: u8) -> TransactionReference {
        TransactionReference::new([tag; 32])
    }

    fn gamete_request(tag: u8) -> Request {
        Request::GameteCreation {
            classpath: tx(0xEE),
            initial_amount: 1_000_000.into(),
            public_key: format!("{tag:02x}"),
        }
    }

    fn creation_response(object: StorageReference, balance: i64) -> Response {
        Response::GameteCreated {
            gamete: object,
            updates: vec![
                Update::ClassTag {
                    object,
                    class: "lang.ExternallyOwnedAccount".to_string(),
                },
                Update::Field {
                    object,
                    field: FieldSignature::new(
                        "lang.ExternallyOwnedAccount",
                        "balance",
                        StorageType::BigInteger,
                    ),
                    value: StorageValue::BigInteger(balance.into()),
                },
            ],
            events: vec![],
            gas: GasCounts::ZERO,
        }
    }

    fn balance_update_response(object: StorageReference, balance: i64) -> Response {
        Response::MethodSuccessful {
            result: None,
            updates: vec![Update::Field {
                object,
                field: FieldSignature::new(
                    "lang.ExternallyOwnedAccount",
                    "balance",
                    StorageType::BigInteger,
                ),
                value: StorageValue::BigInteger(balance.into()),
            }],
            events: vec![],
            gas: GasCounts { cpu: 1, ram: 0, storage: 0 },
        }
    }

    #[test]
    fn test_commit_then_read_back() {
        let store = open_store();
        let object = StorageReference::new(tx(1), 0);

        let mut txn = store.begin_transformation(ConsensusConfig::default(), 1000);
        txn.push(tx(1), gamete_request(1), creation_response(object, 500));
        let id = txn.commit().unwrap();
        assert_eq!(id.commits, 1);

        let committed = store.checkout_at(id);
        assert!(committed.get_response(&tx(1)).unwrap().is_some());
        assert!(committed.get_request(&tx(1)).unwrap().is_some());
        assert_eq!(committed.get_history(&object).unwrap(), vec![tx(1)]);

        let state = committed.get_state(&object).unwrap().unwrap();
        assert_eq!(state.class, "lang.ExternallyOwnedAccount");
        assert_eq!(
            state.fields.values().next().unwrap(),
            &StorageValue::BigInteger(500.into())
        );
    }

    #[test]
    fn test_histories_are_newest_first() {
        let store = open_store();
        let object = StorageReference::new(tx(1), 0);

        let mut txn = store.begin_transformation(ConsensusConfig::default(), 0);
        txn.push(tx(1), gamete_request(1), creation_response(object, 100));
        txn.push(tx(2), gamete_request(2), balance_update_response(object, 90));
        txn.push(tx(3), gamete_request(3), balance_update_response(object, 80));
        let id = txn.commit().unwrap();

        let committed = store.checkout_at(id);
        assert_eq!(
            committed.get_history(&object).unwrap(),
            vec![tx(3), tx(2), tx(1)]
        );
        // Newest wins in the fold.
        let state = committed.get_state(&object).unwrap().unwrap();
        assert_eq!(
            state.fields.values().next().unwrap(),
            &StorageValue::BigInteger(80.into())
        );
    }

    #[test]
    fn test_read_your_writes_before_commit() {
        let store = open_store();
        let object = StorageReference::new(tx(1), 0);

        let mut txn = store.begin_transformation(ConsensusConfig::default(), 0);
        txn.push(tx(1), gamete_request(1), creation_response(object, 100));
        // The uncommitted transformation already sees the staged state.
        assert_eq!(txn.get_history(&object).unwrap(), vec![tx(1)]);
        assert!(txn.get_response(&tx(1)).unwrap().is_some());
        let state = txn.get_state(&object).unwrap().unwrap();
        assert_eq!(state.class, "lang.ExternallyOwnedAccount");
        // But the base store does not.
        assert!(store.get_response(&tx(1)).unwrap().is_none());
    }

    #[test]
    fn test_abandon_leaves_store_untouched() {
        let store = open_store();
        let id_before = *store.id();
        let object = StorageReference::new(tx(1), 0);

        let mut txn = store.begin_transformation(ConsensusConfig::default(), 0);
        txn.push(tx(1), gamete_request(1), creation_response(object, 100));
        txn.abandon();

        assert_eq!(store.id(), &id_before);
        assert!(store.get_response(&tx(1)).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_survives_later_commits() {
        let store = open_store();
        let object = StorageReference::new(tx(1), 0);

        let mut txn = store.begin_transformation(ConsensusConfig::default(), 0);
        txn.push(tx(1), gamete_request(1), creation_response(object, 100));
        let id1 = txn.commit().unwrap();

        let at1 = store.checkout_at(id1);
        let mut txn = at1.begin_transformation(ConsensusConfig::default(), 1);
        txn.push(tx(2), gamete_request(2), balance_update_response(object, 42));
        let id2 = txn.commit().unwrap();
        assert_eq!(id2.commits, 2);

        // The old snapshot still answers with the old values.
        let old = store.checkout_at(id1);
        let state = old.get_state(&object).unwrap().unwrap();
        assert_eq!(
            state.fields.values().next().unwrap(),
            &StorageValue::BigInteger(100.into())
        );
        let new = store.checkout_at(id2);
        let state = new.get_state(&object).unwrap().unwrap();
        assert_eq!(
            state.fields.values().next().unwrap(),
            &StorageValue::BigInteger(42.into())
        );
    }

    #[test]
    fn test_identical_batches_yield_identical_ids() {
        let run = || {
            let store = open_store();
            let object = StorageReference::new(tx(1), 0);
            let mut txn = store.begin_transformation(ConsensusConfig::default(), 7);
            txn.push(tx(1), gamete_request(1), creation_response(object, 100));
            txn.push(tx(2), gamete_request(2), balance_update_response(object, 90));
            txn.commit().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_manifest_and_consensus_round_trip() {
        let store = open_store();
        let manifest = StorageReference::new(tx(9), 0);
        let consensus = ConsensusConfig {
            chain_id: "strata-unit".to_string(),
            ..ConsensusConfig::default()
        };

        let mut txn = store.begin_transformation(consensus.clone(), 0);
        txn.set_manifest(manifest);
        let id = txn.commit().unwrap();

        let committed = store.checkout_at(id);
        assert_eq!(committed.get_manifest().unwrap(), Some(manifest));
        assert_eq!(committed.get_consensus().unwrap(), Some(consensus));
    }
}
