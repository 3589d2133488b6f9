//! # The Node
//!
//! Wires the store, the pipeline and the executor into a running service.
//!
//! ## Scheduling model
//!
//! Delivery is single-writer: one scheduler task owns the current
//! transformation, drains the submission queue in arrival order into
//! batches, executes each request through the pipeline and commits the
//! batch as one new state. Reads are multi-reader: they resolve an
//! immutable snapshot handle and never block the writer.
//!
//! A fatal store error halts intake; the node then refuses requests until
//! an operator resumes it from a known good state.

use crate::config::LocalNodeConfig;
use crate::errors::NodeError;
use crate::ports::{NodeApi, TimeSource};
use async_trait::async_trait;
use num_bigint::BigInt;
use shared_crypto::{Ed25519KeyPair, Hasher};
use shared_types::{ConsensusConfig, Request, Response, StorageReference, TransactionReference};
use st_01_key_value::KeyValueStore;
use st_03_state_store::{ObjectState, StateId, StateView, Store};
use st_04_execution::{ClassLoaderProvider, CodeExecutor, Pipeline, PipelineError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot, Semaphore};

const QUEUE_CAPACITY: usize = 1024;

/// One queued request, with the waiter of `add` when there is one.
struct Submission {
    request: Request,
    reply: Option<oneshot::Sender<Result<Response, NodeError>>>,
}

struct NodeInner {
    config: LocalNodeConfig,
    /// Anchor of the store lineage; snapshots check out from here.
    store: Store,
    /// The latest committed snapshot.
    current: RwLock<Store>,
    pipeline: Pipeline,
    genesis_consensus: ConsensusConfig,
    time: Arc<dyn TimeSource>,
    halted: AtomicBool,
    /// Read pool: bounds concurrent snapshot reads.
    reads: Semaphore,
}

/// A running node. Cheap to clone; all clones share the same engine.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
    queue: mpsc::Sender<Submission>,
}

impl Node {
    /// Opens the store on `kvs` and starts the scheduler task. Must be
    /// called within a tokio runtime.
    pub fn start(
        config: LocalNodeConfig,
        kvs: Arc<dyn KeyValueStore>,
        hasher: Arc<dyn Hasher>,
        executor: Arc<dyn CodeExecutor>,
        loaders: Arc<dyn ClassLoaderProvider>,
        genesis_consensus: ConsensusConfig,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, NodeError> {
        let store = Store::open(kvs, hasher)?;
        let reads = Semaphore::new(config.worker_threads.max(1));
        let inner = Arc::new(NodeInner {
            config,
            current: RwLock::new(store.clone()),
            store,
            pipeline: Pipeline::new(executor, loaders),
            genesis_consensus,
            time,
            halted: AtomicBool::new(false),
            reads,
        });

        let (queue, receiver) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(scheduler(Arc::clone(&inner), receiver));
        tracing::info!("[st-05] node started at {}", inner.store.id());
        Ok(Self { inner, queue })
    }

    /// The reference `request` would be recorded under.
    #[must_use]
    pub fn reference_of(&self, request: &Request) -> TransactionReference {
        self.inner.store.reference_of(request)
    }

    /// A read-only store handle at an explicit historical state.
    #[must_use]
    pub fn store_at(&self, id: StateId) -> Store {
        self.inner.store.checkout_at(id)
    }

    /// True once a fatal error has stopped intake.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.inner.halted.load(Ordering::SeqCst)
    }

    /// Operator recovery: reopen intake from a known good state.
    pub fn resume_at(&self, id: StateId) -> Result<(), NodeError> {
        let mut current = self
            .inner
            .current
            .write()
            .map_err(|_| NodeError::Internal("state lock poisoned".to_string()))?;
        *current = self.inner.store.checkout_at(id);
        self.inner.halted.store(false, Ordering::SeqCst);
        tracing::warn!("[st-05] resumed at {id}");
        Ok(())
    }

    /// Bootstrap helper: creates the gamete holding `initial_amount` and
    /// installs the base `module` paid by it. Returns the gamete and the
    /// module's classpath. Initialization of the manifest is left to the
    /// operator, since it needs a constructed manifest object.
    pub async fn bootstrap(
        &self,
        module: Vec<u8>,
        pair: &Ed25519KeyPair,
        initial_amount: BigInt,
    ) -> Result<(StorageReference, TransactionReference), NodeError> {
        let consensus = self.effective_consensus()?;

        let gamete_request = Request::GameteCreation {
            classpath: TransactionReference::new([0; 32]),
            initial_amount,
            public_key: pair.public_key_hex(),
        };
        let Response::GameteCreated { gamete, .. } = self.add(gamete_request).await? else {
            return Err(NodeError::Internal(
                "gamete creation produced an unexpected response".to_string(),
            ));
        };

        let mut install = Request::InstallCode {
            caller: gamete,
            nonce: 0.into(),
            gas_limit: consensus.max_gas_per_request.min(1_000_000),
            gas_price: consensus.min_gas_price.max(1),
            chain_id: consensus.chain_id.clone(),
            classpath: TransactionReference::new([0; 32]),
            module,
            dependencies: vec![],
            signature: vec![],
        };
        let signature = pair.sign(&install.signed_payload());
        if let Request::InstallCode { signature: slot, .. } = &mut install {
            *slot = signature;
        }
        let classpath = self.reference_of(&install);

        match self.add(install).await? {
            Response::InstallCodeSuccessful { .. } => Ok((gamete, classpath)),
            other => Err(NodeError::Internal(format!(
                "base module installation failed with selector {}",
                other.selector()
            ))),
        }
    }

    fn current(&self) -> Result<Store, NodeError> {
        self.inner
            .current
            .read()
            .map(|current| current.clone())
            .map_err(|_| NodeError::Internal("state lock poisoned".to_string()))
    }

    fn effective_consensus(&self) -> Result<ConsensusConfig, NodeError> {
        Ok(self
            .current()?
            .get_consensus()?
            .unwrap_or_else(|| self.inner.genesis_consensus.clone()))
    }

    fn ensure_accepting(&self) -> Result<(), NodeError> {
        if self.is_halted() {
            Err(NodeError::Halted)
        } else {
            Ok(())
        }
    }

    async fn read_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, NodeError> {
        self.inner
            .reads
            .acquire()
            .await
            .map_err(|_| NodeError::Internal("read pool closed".to_string()))
    }
}

#[async_trait]
impl NodeApi for Node {
    async fn post(&self, request: Request) -> Result<TransactionReference, NodeError> {
        self.ensure_accepting()?;
        let reference = self.reference_of(&request);
        self.queue
            .send(Submission { request, reply: None })
            .await
            .map_err(|_| NodeError::ShuttingDown)?;
        Ok(reference)
    }

    async fn add(&self, request: Request) -> Result<Response, NodeError> {
        self.ensure_accepting()?;
        let (reply, waiter) = oneshot::channel();
        self.queue
            .send(Submission { request, reply: Some(reply) })
            .await
            .map_err(|_| NodeError::ShuttingDown)?;
        match tokio::time::timeout(self.inner.config.add_timeout(), waiter).await {
            Err(_) => Err(NodeError::Timeout),
            Ok(Err(_)) => Err(NodeError::ShuttingDown),
            Ok(Ok(outcome)) => outcome,
        }
    }

    async fn get_response(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Response>, NodeError> {
        let _permit = self.read_permit().await?;
        Ok(self.current()?.get_response(reference)?)
    }

    async fn get_request(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Request>, NodeError> {
        let _permit = self.read_permit().await?;
        Ok(self.current()?.get_request(reference)?)
    }

    async fn get_history(
        &self,
        object: &StorageReference,
    ) -> Result<Vec<TransactionReference>, NodeError> {
        let _permit = self.read_permit().await?;
        Ok(self.current()?.get_history(object)?)
    }

    async fn get_state(
        &self,
        object: &StorageReference,
    ) -> Result<Option<ObjectState>, NodeError> {
        let _permit = self.read_permit().await?;
        Ok(self.current()?.get_state(object)?)
    }

    async fn get_manifest(&self) -> Result<Option<StorageReference>, NodeError> {
        let _permit = self.read_permit().await?;
        Ok(self.current()?.get_manifest()?)
    }

    async fn state_id(&self) -> Result<StateId, NodeError> {
        Ok(*self.current()?.id())
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

async fn scheduler(inner: Arc<NodeInner>, mut queue: mpsc::Receiver<Submission>) {
    tracing::info!("[st-05] scheduler running");
    while let Some(first) = queue.recv().await {
        let mut batch = vec![first];
        while batch.len() < inner.config.max_batch_size {
            match queue.try_recv() {
                Ok(submission) => batch.push(submission),
                Err(_) => break,
            }
        }

        if inner.halted.load(Ordering::SeqCst) {
            for submission in batch {
                respond(submission.reply, Err(NodeError::Halted));
            }
            continue;
        }

        deliver_batch(&inner, batch);
    }
    tracing::info!("[st-05] scheduler stopped");
}

fn deliver_batch(inner: &NodeInner, batch: Vec<Submission>) {
    let base = match inner.current.read() {
        Ok(current) => current.clone(),
        Err(_) => {
            for submission in batch {
                respond(
                    submission.reply,
                    Err(NodeError::Internal("state lock poisoned".to_string())),
                );
            }
            return;
        }
    };

    let consensus = match base.get_consensus() {
        Ok(Some(consensus)) => consensus,
        Ok(None) => inner.genesis_consensus.clone(),
        Err(error) => {
            tracing::error!("[st-05] cannot read consensus, halting: {error}");
            inner.halted.store(true, Ordering::SeqCst);
            for submission in batch {
                respond(submission.reply, Err(NodeError::Halted));
            }
            return;
        }
    };

    let mut txn = base.begin_transformation(consensus, inner.time.now());
    let mut outcomes = Vec::with_capacity(batch.len());
    let mut submissions = batch.into_iter();
    let mut fatal = false;

    for submission in submissions.by_ref() {
        match inner.pipeline.deliver(&mut txn, submission.request) {
            Ok((_, response)) => outcomes.push((submission.reply, Ok(response))),
            Err(PipelineError::Rejected(rejection)) => {
                outcomes.push((submission.reply, Err(NodeError::Rejected(rejection))));
            }
            Err(error) => {
                tracing::error!("[st-05] fatal error in delivery, halting: {error}");
                inner.halted.store(true, Ordering::SeqCst);
                outcomes.push((submission.reply, Err(error.into())));
                fatal = true;
                break;
            }
        }
    }

    if fatal {
        txn.abandon();
        for submission in submissions {
            respond(submission.reply, Err(NodeError::Halted));
        }
        flush(outcomes);
        return;
    }

    if txn.deliver_count() == 0 {
        // Every request was rejected: nothing to commit.
        txn.abandon();
        flush(outcomes);
        return;
    }

    match txn.commit() {
        Ok(id) => {
            if let Ok(mut current) = inner.current.write() {
                *current = base.checkout_at(id);
            }
            flush(outcomes);
        }
        Err(error) => {
            tracing::error!("[st-05] commit failed, halting: {error}");
            inner.halted.store(true, Ordering::SeqCst);
            for (reply, _) in outcomes {
                respond(reply, Err(NodeError::Halted));
            }
        }
    }
}

fn flush(outcomes: Vec<(Option<oneshot::Sender<Result<Response, NodeError>>>, Result<Response, NodeError>)>) {
    for (reply, outcome) in outcomes {
        respond(reply, outcome);
    }
}

fn respond(
    reply: Option<oneshot::Sender<Result<Response, NodeError>>>,
    outcome: Result<Response, NodeError>,
) {
    if let Some(reply) = reply {
        // The waiter may have timed out and gone away; that is fine.
        let _ = reply.send(outcome);
    }
}

// =============================================================================
// TESTS
// =============================================================================
