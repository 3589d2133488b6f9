//! # The Transaction Pipeline
//!
//! Turns one request into one response against a store transformation,
//! deterministically: same snapshot, same consensus, same `now`, same
//! request — same response bytes.
//!
//! The stages are:
//!
//! 1. **Check** — validate the request against the current view. A failure
//!    here is a *rejection*: nothing is charged, nothing is stored.
//! 2. **Charge upfront** — the full gas limit at the declared price is
//!    debited and the caller's nonce bumped; these forced updates survive
//!    every later failure.
//! 3. **Deliver** — the responder for the request kind runs, invoking the
//!    external code executor for constructor and method calls.
//! 4. **Post** — unused gas is refunded (outside the failed paths), the
//!    forced and executor updates are merged (last write per object/field
//!    wins) and sorted into the canonical order, and the response is
//!    assembled.
//!
//! Failures inside Deliver are data, not control flow: they travel the
//! [`DeliverFlow`] sum type into failed or exception responses.

use crate::errors::{ExecutionAbort, PipelineError, RejectionError};
use crate::gas::GasMeter;
use crate::ports::{
    CallContext, CallTarget, ClassLoader, ClassLoaderProvider, CodeExecutor, ExecutionEffects,
    ExecutorOutcome,
};
use lru::LruCache;
use num_bigint::BigInt;
use shared_crypto::signature_scheme_named;
use shared_types::{
    standard, FailureCause, FieldSignature, GasCounts, Request, Response, StorageReference,
    StorageValue, TransactionReference, Update,
};
use st_03_state_store::{StateId, StateView, StoreError, StoreTransformation};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const LOADER_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(size) => size,
    None => unreachable!(),
};

/// The pipeline, shared by every transformation the node runs.
pub struct Pipeline {
    executor: Arc<dyn CodeExecutor>,
    loader_provider: Arc<dyn ClassLoaderProvider>,
    loaders: Mutex<LruCache<(TransactionReference, StateId), Arc<dyn ClassLoader>>>,
}

/// What Deliver produced, before Post turns it into a response.
/// Rejections never reach this type: they leave through the error channel
/// of [`Pipeline::deliver`] without touching state.
enum DeliverFlow {
    /// The code ran to completion.
    Ok(ExecutionEffects),
    /// The code was reached and threw.
    ExecutedWithException {
        class: String,
        message: String,
        effects: ExecutionEffects,
    },
    /// The executor aborted after gas was charged.
    Failed(FailureCause),
}

/// The caller's pre-charge accounting, captured by Check.
struct Payer {
    reference: StorageReference,
    balance: BigInt,
    nonce: BigInt,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        executor: Arc<dyn CodeExecutor>,
        loader_provider: Arc<dyn ClassLoaderProvider>,
    ) -> Self {
        Self {
            executor,
            loader_provider,
            loaders: Mutex::new(LruCache::new(LOADER_CACHE_SIZE)),
        }
    }

    /// Runs the full pipeline for `request` and records the outcome in
    /// the transformation.
    ///
    /// On `Ok`, the `(request, response)` pair has been staged and the
    /// histories of every updated object prepended. On
    /// [`PipelineError::Rejected`] the transformation is untouched.
    pub fn deliver(
        &self,
        txn: &mut StoreTransformation,
        request: Request,
    ) -> Result<(TransactionReference, Response), PipelineError> {
        let reference = txn.reference_of(&request);
        let payer = self.check(txn, &request, &reference)?;
        let response = self.respond(txn, &request, reference, payer)?;

        if let (Request::InitializeManifest { manifest, .. }, Response::Initialized { .. }) =
            (&request, &response)
        {
            txn.set_manifest(*manifest);
        }

        tracing::debug!(
            "[st-04] delivered {reference}: selector {} -> selector {}",
            request.selector(),
            response.selector()
        );
        txn.push(reference, request, response.clone());
        Ok((reference, response))
    }

    // =========================================================================
    // CHECK
    // =========================================================================

    fn check(
        &self,
        txn: &StoreTransformation,
        request: &Request,
        reference: &TransactionReference,
    ) -> Result<Option<Payer>, PipelineError> {
        match request {
            Request::GameteCreation { .. } => {
                if txn.get_manifest()?.is_some() {
                    return Err(RejectionError::ManifestAlreadySet.into());
                }
                if txn.get_response(reference)?.is_some() {
                    return Err(RejectionError::AlreadyDelivered(reference.to_string()).into());
                }
                Ok(None)
            }

            Request::InitializeManifest { manifest, .. } => {
                if txn.get_manifest()?.is_some() {
                    return Err(RejectionError::ManifestAlreadySet.into());
                }
                if txn.get_state(manifest)?.is_none() {
                    return Err(RejectionError::ManifestObjectMissing(manifest.to_string()).into());
                }
                Ok(None)
            }

            _ => self.check_non_initial(txn, request, reference).map(Some),
        }
    }

    fn check_non_initial(
        &self,
        txn: &StoreTransformation,
        request: &Request,
        reference: &TransactionReference,
    ) -> Result<Payer, PipelineError> {
        let consensus = txn.consensus();
        let (Some(caller), Some(nonce), Some(limit), Some(price)) = (
            request.caller(),
            request.nonce(),
            request.gas_limit(),
            request.gas_price(),
        ) else {
            return Err(
                StoreError::Corrupted("non-initial request without payer fields".to_string())
                    .into(),
            );
        };

        // The caller must resolve to an externally-owned account.
        let Some(state) = txn.get_state(caller)? else {
            return Err(RejectionError::UnknownCaller(caller.to_string()).into());
        };
        let Some(StorageValue::String(public_key)) = state.field(&standard::public_key_field())
        else {
            return Err(RejectionError::CallerNotAnAccount(caller.to_string()).into());
        };
        let public_key = public_key.clone();

        // Its nonce must equal the declared one.
        let current_nonce = state
            .field(&standard::nonce_field())
            .and_then(StorageValue::as_big_integer)
            .cloned()
            .unwrap_or_default();
        if &current_nonce != nonce {
            return Err(RejectionError::NonceMismatch {
                expected: current_nonce.to_string(),
                actual: nonce.to_string(),
            }
            .into());
        }

        // Gas bounds from consensus.
        if limit > consensus.max_gas_per_request {
            return Err(RejectionError::GasLimitTooHigh {
                max: consensus.max_gas_per_request,
                requested: limit,
            }
            .into());
        }
        let is_system = matches!(request, Request::InstanceSystemMethodCall { .. });
        if !is_system && price < consensus.min_gas_price {
            return Err(RejectionError::GasPriceTooLow {
                min: consensus.min_gas_price,
                offered: price,
            }
            .into());
        }

        // It must afford the upfront charge.
        let balance = state
            .field(&standard::balance_field())
            .and_then(StorageValue::as_big_integer)
            .cloned()
            .unwrap_or_default();
        let required = BigInt::from(limit) * BigInt::from(price);
        if balance < required {
            return Err(RejectionError::InsufficientBalance {
                required: required.to_string(),
                available: balance.to_string(),
            }
            .into());
        }

        // The request must target this chain.
        if let Some(chain_id) = request.chain_id() {
            if chain_id != consensus.chain_id {
                return Err(RejectionError::ChainIdMismatch {
                    expected: consensus.chain_id.clone(),
                    actual: chain_id.to_string(),
                }
                .into());
            }
        }

        // The signature must verify over the unsigned canonical bytes.
        if let Some(signature) = request.signature() {
            let scheme = signature_scheme_named(&consensus.signature_algorithm)?;
            let key = hex::decode(&public_key).map_err(|_| RejectionError::InvalidSignature)?;
            let valid = scheme
                .verify(&request.signed_payload(), &key, signature)
                .map_err(|_| RejectionError::InvalidSignature)?;
            if !valid {
                return Err(RejectionError::InvalidSignature.into());
            }
        }

        // Replays of already-delivered bytes stop here at the latest.
        if txn.get_response(reference)?.is_some() {
            return Err(RejectionError::AlreadyDelivered(reference.to_string()).into());
        }

        // The executable module must exist.
        match request {
            Request::InstallCode { dependencies, .. } => {
                for dependency in dependencies {
                    self.require_installed(txn, dependency)?;
                }
            }
            _ => self.require_installed(txn, request.classpath())?,
        }

        Ok(Payer {
            reference: *caller,
            balance,
            nonce: current_nonce,
        })
    }

    fn require_installed(
        &self,
        txn: &StoreTransformation,
        classpath: &TransactionReference,
    ) -> Result<(), PipelineError> {
        match txn.get_response(classpath)? {
            Some(Response::InstallCodeSuccessful { .. }) => Ok(()),
            _ => Err(RejectionError::ClasspathNotFound(classpath.to_string()).into()),
        }
    }

    // =========================================================================
    // DELIVER
    // =========================================================================

    fn respond(
        &self,
        txn: &StoreTransformation,
        request: &Request,
        reference: TransactionReference,
        payer: Option<Payer>,
    ) -> Result<Response, PipelineError> {
        match (request, payer) {
            (Request::GameteCreation { initial_amount, public_key, .. }, _) => {
                Ok(gamete_response(reference, initial_amount, public_key))
            }

            (Request::InitializeManifest { .. }, _) => Ok(Response::Initialized {
                updates: vec![],
                events: vec![],
                gas: GasCounts::ZERO,
            }),

            (
                Request::InstallCode {
                    gas_limit,
                    gas_price,
                    module,
                    dependencies,
                    ..
                },
                Some(payer),
            ) => Ok(self.respond_install(txn, &payer, *gas_limit, *gas_price, module, dependencies)),

            (_, Some(payer)) => self.respond_call(txn, request, reference, &payer),

            (_, None) => Err(StoreError::Corrupted(
                "paid request reached Deliver without a payer".to_string(),
            )
            .into()),
        }
    }

    fn respond_install(
        &self,
        txn: &StoreTransformation,
        payer: &Payer,
        limit: u64,
        price: u64,
        module: &[u8],
        dependencies: &[TransactionReference],
    ) -> Response {
        let model = txn.consensus().gas_cost_model;
        let mut meter = GasMeter::new(limit, model);

        let installed = meter
            .charge_cpu(model.base_cpu_transaction_cost)
            .and_then(|()| meter.charge_storage_bytes(module.len()))
            .and_then(|()| self.executor.install_module(module, dependencies, &mut meter));

        match installed {
            Ok(instrumented) => {
                let (updates, gas) = settle_success(payer, &meter, limit, price, &[]);
                Response::InstallCodeSuccessful {
                    module: instrumented,
                    dependencies: dependencies.to_vec(),
                    updates,
                    events: vec![],
                    gas,
                }
            }
            Err(abort) => {
                let (updates, gas, penalty) = settle_failure(payer, &meter, limit, price);
                Response::InstallCodeFailed {
                    cause: abort.into(),
                    penalty,
                    updates,
                    events: vec![],
                    gas,
                }
            }
        }
    }

    fn respond_call(
        &self,
        txn: &StoreTransformation,
        request: &Request,
        reference: TransactionReference,
        payer: &Payer,
    ) -> Result<Response, PipelineError> {
        let (limit, price, classpath, target, actuals, is_view, is_constructor) = match request {
            Request::ConstructorCall {
                gas_limit,
                gas_price,
                classpath,
                constructor,
                actuals,
                ..
            } => (
                *gas_limit,
                *gas_price,
                *classpath,
                CallTarget::Constructor(constructor),
                actuals.as_slice(),
                false,
                true,
            ),
            Request::InstanceMethodCall {
                gas_limit,
                gas_price,
                classpath,
                method,
                receiver,
                actuals,
                view,
                ..
            } => (
                *gas_limit,
                *gas_price,
                *classpath,
                CallTarget::Instance { method, receiver: *receiver },
                actuals.as_slice(),
                *view,
                false,
            ),
            Request::StaticMethodCall {
                gas_limit,
                gas_price,
                classpath,
                method,
                actuals,
                view,
                ..
            } => (
                *gas_limit,
                *gas_price,
                *classpath,
                CallTarget::Static { method },
                actuals.as_slice(),
                *view,
                false,
            ),
            Request::InstanceSystemMethodCall {
                gas_limit,
                classpath,
                method,
                receiver,
                actuals,
                ..
            } => (
                *gas_limit,
                0,
                *classpath,
                CallTarget::Instance { method, receiver: *receiver },
                actuals.as_slice(),
                false,
                false,
            ),
            _ => {
                return Err(StoreError::Corrupted(
                    "non-call request reached the call responder".to_string(),
                )
                .into())
            }
        };

        let model = txn.consensus().gas_cost_model;
        let mut meter = GasMeter::new(limit, model);

        // The executor observes the post-charge accounting of the caller.
        let charged_view = ChargedView {
            base: txn,
            caller: payer.reference,
            balance: &payer.balance - BigInt::from(limit) * BigInt::from(price),
            nonce: &payer.nonce + 1,
        };

        let flow = match meter.charge_cpu(model.base_cpu_transaction_cost) {
            Err(abort) => DeliverFlow::Failed(abort.into()),
            Ok(()) => match self.loader_for(txn, *txn.base_id(), classpath) {
                Err(abort) => DeliverFlow::Failed(abort.into()),
                Ok(loader) => {
                    let context = CallContext {
                        transaction: reference,
                        classpath,
                        caller: payer.reference,
                        target,
                        actuals,
                        now: txn.now(),
                    };
                    match self
                        .executor
                        .execute_call(&context, loader.as_ref(), &charged_view, &mut meter)
                    {
                        Err(abort) => DeliverFlow::Failed(abort.into()),
                        Ok(outcome) => classify(outcome, is_view, &payer.reference),
                    }
                }
            },
        };

        // Post: refund, merge, sort, assemble.
        Ok(match flow {
            DeliverFlow::Ok(effects) => {
                let (updates, gas) = settle_success(payer, &meter, limit, price, &effects.updates);
                if is_constructor {
                    match effects.new_object {
                        Some(new_object) => Response::ConstructorSuccessful {
                            new_object,
                            updates,
                            events: effects.events,
                            gas,
                        },
                        None => {
                            let (updates, gas, penalty) =
                                settle_failure(payer, &meter, limit, price);
                            Response::ConstructorFailed {
                                cause: FailureCause::Internal(
                                    "constructor produced no object".to_string(),
                                ),
                                penalty,
                                updates,
                                events: vec![],
                                gas,
                            }
                        }
                    }
                } else {
                    Response::MethodSuccessful {
                        result: effects.result,
                        updates,
                        events: effects.events,
                        gas,
                    }
                }
            }

            DeliverFlow::ExecutedWithException { class, message, effects } => {
                let (updates, gas) = settle_success(payer, &meter, limit, price, &effects.updates);
                if is_constructor {
                    Response::ConstructorException {
                        exception_class: class,
                        message,
                        updates,
                        events: effects.events,
                        gas,
                    }
                } else {
                    Response::MethodException {
                        exception_class: class,
                        message,
                        updates,
                        events: effects.events,
                        gas,
                    }
                }
            }

            DeliverFlow::Failed(cause) => {
                let (updates, gas, penalty) = settle_failure(payer, &meter, limit, price);
                if is_constructor {
                    Response::ConstructorFailed { cause, penalty, updates, events: vec![], gas }
                } else {
                    Response::MethodFailed { cause, penalty, updates, events: vec![], gas }
                }
            }
        })
    }

    fn loader_for(
        &self,
        view: &dyn StateView,
        base: StateId,
        classpath: TransactionReference,
    ) -> Result<Arc<dyn ClassLoader>, ExecutionAbort> {
        // Cached per (classpath, base state): the same module resolves to
        // the same loader for every call in a batch.
        let key = (classpath, base);
        if let Ok(mut cache) = self.loaders.lock() {
            if let Some(loader) = cache.get(&key) {
                return Ok(Arc::clone(loader));
            }
        }
        let loader = self.loader_provider.load(&classpath, view)?;
        if let Ok(mut cache) = self.loaders.lock() {
            cache.put(key, Arc::clone(&loader));
        }
        Ok(loader)
    }
}

// =============================================================================
// POST HELPERS
// =============================================================================

fn classify(
    outcome: ExecutorOutcome,
    is_view: bool,
    caller: &StorageReference,
) -> DeliverFlow {
    let effects = match &outcome {
        ExecutorOutcome::Success(effects) => effects,
        ExecutorOutcome::Exception { effects, .. } => effects,
    };
    if is_view {
        if let Some(offender) = view_violation(effects, caller) {
            return DeliverFlow::Failed(FailureCause::ViewViolation(offender));
        }
    }
    match outcome {
        ExecutorOutcome::Success(effects) => DeliverFlow::Ok(effects),
        ExecutorOutcome::Exception { class, message, effects } => {
            DeliverFlow::ExecutedWithException { class, message, effects }
        }
    }
}

/// A view call may only touch the caller's balance and nonce bookkeeping.
fn view_violation(effects: &ExecutionEffects, caller: &StorageReference) -> Option<String> {
    for update in &effects.updates {
        let allowed = match update {
            Update::Field { object, field, .. } => {
                object == caller
                    && (*field == standard::balance_field() || *field == standard::nonce_field())
            }
            Update::ClassTag { .. } => false,
        };
        if !allowed {
            return Some(update.to_string());
        }
    }
    None
}

fn gamete_response(
    reference: TransactionReference,
    initial_amount: &BigInt,
    public_key: &str,
) -> Response {
    let gamete = StorageReference::new(reference, 0);
    let mut updates = vec![
        Update::ClassTag {
            object: gamete,
            class: standard::EOA_CLASS.to_string(),
        },
        balance_update(gamete, initial_amount.clone()),
        nonce_update(gamete, BigInt::from(0)),
        Update::Field {
            object: gamete,
            field: standard::public_key_field(),
            value: StorageValue::String(public_key.to_string()),
        },
    ];
    updates.sort();
    Response::GameteCreated {
        gamete,
        updates,
        events: vec![],
        gas: GasCounts::ZERO,
    }
}

fn balance_update(object: StorageReference, value: BigInt) -> Update {
    Update::Field {
        object,
        field: standard::balance_field(),
        value: StorageValue::BigInteger(value),
    }
}

fn nonce_update(object: StorageReference, value: BigInt) -> Update {
    Update::Field {
        object,
        field: standard::nonce_field(),
        value: StorageValue::BigInteger(value),
    }
}

/// Refunds unused gas and merges the forced updates over the executor's,
/// returning the canonical update list and the gas split.
fn settle_success(
    payer: &Payer,
    meter: &GasMeter,
    limit: u64,
    price: u64,
    executor_updates: &[Update],
) -> (Vec<Update>, GasCounts) {
    let gas = meter.consumed();
    let refund = BigInt::from(limit - gas.total()) * BigInt::from(price);
    let after_charge = &payer.balance - BigInt::from(limit) * BigInt::from(price);

    // The executor may itself have moved the caller's balance; the refund
    // lands on top of whatever it left.
    let executor_balance = executor_updates.iter().find_map(|update| match update {
        Update::Field { object, field, value }
            if object == &payer.reference && *field == standard::balance_field() =>
        {
            value.as_big_integer().cloned()
        }
        _ => None,
    });
    let final_balance = executor_balance.unwrap_or(after_charge) + refund;

    let mut in_order = executor_updates.to_vec();
    in_order.push(balance_update(payer.reference, final_balance));
    in_order.push(nonce_update(payer.reference, &payer.nonce + 1));
    (merge_and_sort(in_order), gas)
}

/// The failed path keeps only the forced updates; the unconsumed remainder
/// of the limit becomes the penalty.
fn settle_failure(
    payer: &Payer,
    meter: &GasMeter,
    limit: u64,
    price: u64,
) -> (Vec<Update>, GasCounts, u64) {
    let gas = meter.consumed();
    let penalty = limit - gas.total();
    let after_charge = &payer.balance - BigInt::from(limit) * BigInt::from(price);
    let updates = merge_and_sort(vec![
        balance_update(payer.reference, after_charge),
        nonce_update(payer.reference, &payer.nonce + 1),
    ]);
    (updates, gas, penalty)
}

/// Collapses same-(object, field) updates to the last one seen, then
/// yields the canonical total order: object, class tags first, fields.
fn merge_and_sort(in_order: Vec<Update>) -> Vec<Update> {
    let mut merged: BTreeMap<(StorageReference, Option<FieldSignature>), Update> = BTreeMap::new();
    for update in in_order {
        let key = match &update {
            Update::ClassTag { object, .. } => (*object, None),
            Update::Field { object, field, .. } => (*object, Some(field.clone())),
        };
        merged.insert(key, update);
    }
    merged.into_values().collect()
}

// =============================================================================
// CHARGED VIEW
// =============================================================================

/// Overlay showing the caller as already charged and nonce-bumped, so the
/// executor observes the accounting the pipeline has committed to.
struct ChargedView<'a> {
    base: &'a dyn StateView,
    caller: StorageReference,
    balance: BigInt,
    nonce: BigInt,
}

impl StateView for ChargedView<'_> {
    fn get_response(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Response>, StoreError> {
        self.base.get_response(reference)
    }

    fn get_request(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Request>, StoreError> {
        self.base.get_request(reference)
    }

    fn get_history(
        &self,
        object: &StorageReference,
    ) -> Result<Vec<TransactionReference>, StoreError> {
        self.base.get_history(object)
    }

    fn get_manifest(&self) -> Result<Option<StorageReference>, StoreError> {
        self.base.get_manifest()
    }

    fn get_consensus(&self) -> Result<Option<shared_types::ConsensusConfig>, StoreError> {
        self.base.get_consensus()
    }

    fn get_state(
        &self,
        object: &StorageReference,
    ) -> Result<Option<st_03_state_store::ObjectState>, StoreError> {
        let mut state = self.base.get_state(object)?;
        if object == &self.caller {
            if let Some(state) = state.as_mut() {
                state.fields.insert(
                    standard::balance_field(),
                    StorageValue::BigInteger(self.balance.clone()),
                );
                state.fields.insert(
                    standard::nonce_field(),
                    StorageValue::BigInteger(self.nonce.clone()),
                );
            }
        }
        Ok(state)
    }

    fn get_field(
        &self,
        object: &StorageReference,
        field: &FieldSignature,
    ) -> Result<Option<StorageValue>, StoreError> {
        if object == &self.caller {
            if *field == standard::balance_field() {
                return Ok(Some(StorageValue::BigInteger(self.balance.clone())));
            }
            if *field == standard::nonce_field() {
                return Ok(Some(StorageValue::BigInteger(self.nonce.clone())));
            }
        }
        self.base.get_field(object, field)
    }
}

// =============================================================================
// TESTS
// =============================================================================
