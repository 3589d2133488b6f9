//! Test fixtures: a bootstrapped chain and a scripted counter contract.
//!
//! The counter is the minimal stateful contract the scenarios need: a
//! single `value` field with a constructor, `get`, `set` and `increment`.

use num_bigint::BigInt;
use shared_crypto::{Ed25519KeyPair, Sha256Hasher};
use shared_types::{
    ConsensusConfig, ConstructorSignature, FieldSignature, GasCostModel, MethodSignature, Request,
    Response, StorageReference, StorageType, StorageValue, TransactionReference, Update,
};
use st_01_key_value::InMemoryKvs;
use st_03_state_store::{StateId, StateView, Store, StoreTransformation};
use st_04_execution::adapters::{OpaqueClassLoaderProvider, ScriptedExecutor};
use st_04_execution::{
    CallTarget, ExecutionAbort, ExecutionEffects, ExecutorOutcome, Pipeline,
};
use std::sync::Arc;

pub const CHAIN_ID: &str = "strata-test";
pub const COUNTER_CLASS: &str = "app.Counter";

/// The consensus parameters the whole suite runs under.
pub fn test_consensus() -> ConsensusConfig {
    ConsensusConfig {
        chain_id: CHAIN_ID.to_string(),
        max_gas_per_request: 1_000_000,
        min_gas_price: 1,
        gas_cost_model: GasCostModel {
            base_cpu_transaction_cost: 10,
            ram_per_cell: 1,
            storage_per_byte: 1,
        },
        ..ConsensusConfig::default()
    }
}

/// The counter's only field.
pub fn counter_value_field() -> FieldSignature {
    FieldSignature::new(COUNTER_CLASS, "value", StorageType::Int)
}

/// Registers the counter behaviors on a scripted executor.
pub fn script_counter(executor: &ScriptedExecutor) {
    executor.on("app.Counter.<init>", |context, _, gas| {
        gas.charge_cpu(5)?;
        gas.charge_ram_cells(1)?;
        let initial = match context.actuals.first() {
            Some(StorageValue::Int(value)) => *value,
            _ => 0,
        };
        let object = StorageReference::new(context.transaction, 0);
        Ok(ExecutorOutcome::Success(ExecutionEffects {
            new_object: Some(object),
            updates: vec![
                Update::ClassTag {
                    object,
                    class: COUNTER_CLASS.to_string(),
                },
                Update::Field {
                    object,
                    field: counter_value_field(),
                    value: StorageValue::Int(initial),
                },
            ],
            ..ExecutionEffects::default()
        }))
    });

    executor.on("app.Counter.get", |context, state, gas| {
        gas.charge_cpu(2)?;
        let receiver = receiver_of(context.target.clone())?;
        let value = state
            .get_field(&receiver, &counter_value_field())
            .map_err(|error| ExecutionAbort::Internal(error.to_string()))?
            .unwrap_or(StorageValue::Int(0));
        Ok(ExecutorOutcome::Success(ExecutionEffects {
            result: Some(value),
            ..ExecutionEffects::default()
        }))
    });

    executor.on("app.Counter.set", |context, _, gas| {
        gas.charge_cpu(3)?;
        let receiver = receiver_of(context.target.clone())?;
        let value = context
            .actuals
            .first()
            .cloned()
            .unwrap_or(StorageValue::Int(0));
        Ok(ExecutorOutcome::Success(ExecutionEffects {
            updates: vec![Update::Field {
                object: receiver,
                field: counter_value_field(),
                value,
            }],
            ..ExecutionEffects::default()
        }))
    });

    executor.on("app.Counter.increment", |context, state, gas| {
        gas.charge_cpu(3)?;
        let receiver = receiver_of(context.target.clone())?;
        let current = match state
            .get_field(&receiver, &counter_value_field())
            .map_err(|error| ExecutionAbort::Internal(error.to_string()))?
        {
            Some(StorageValue::Int(value)) => value,
            _ => 0,
        };
        Ok(ExecutorOutcome::Success(ExecutionEffects {
            result: Some(StorageValue::Int(current + 1)),
            updates: vec![Update::Field {
                object: receiver,
                field: counter_value_field(),
                value: StorageValue::Int(current + 1),
            }],
            ..ExecutionEffects::default()
        }))
    });
}

fn receiver_of(target: CallTarget<'_>) -> Result<StorageReference, ExecutionAbort> {
    match target {
        CallTarget::Instance { receiver, .. } => Ok(receiver),
        _ => Err(ExecutionAbort::Internal(
            "counter methods are instance methods".to_string(),
        )),
    }
}

// =============================================================================
// CHAIN HARNESS
// =============================================================================

/// A committed chain with a funded gamete and an installed module.
pub struct TestChain {
    pub store: Store,
    pub tip: Store,
    pub pipeline: Pipeline,
    pub executor: Arc<ScriptedExecutor>,
    pub pair: Ed25519KeyPair,
    pub gamete: StorageReference,
    pub classpath: TransactionReference,
}

impl TestChain {
    /// Creates the gamete (10^9 units), installs a module, commits.
    pub fn bootstrap() -> Self {
        let store = Store::open(Arc::new(InMemoryKvs::new()), Arc::new(Sha256Hasher))
            .expect("a fresh in-memory store opens");
        let executor = Arc::new(ScriptedExecutor::new());
        script_counter(&executor);
        let pipeline = Pipeline::new(executor.clone(), Arc::new(OpaqueClassLoaderProvider));
        let pair = Ed25519KeyPair::from_seed([42; 32]);

        let mut txn = store.begin_transformation(test_consensus(), 0);
        let gamete_request = Request::GameteCreation {
            classpath: TransactionReference::new([0xEE; 32]),
            initial_amount: 1_000_000_000.into(),
            public_key: pair.public_key_hex(),
        };
        let (_, response) = pipeline
            .deliver(&mut txn, gamete_request)
            .expect("gamete creation is accepted on a fresh store");
        let Response::GameteCreated { gamete, .. } = response else {
            panic!("expected a gamete response");
        };

        let install = sign_with(
            Request::InstallCode {
                caller: gamete,
                nonce: 0.into(),
                gas_limit: 100_000,
                gas_price: 1,
                chain_id: CHAIN_ID.to_string(),
                classpath: TransactionReference::new([0xEE; 32]),
                module: b"counter module".to_vec(),
                dependencies: vec![],
                signature: vec![],
            },
            &pair,
        );
        let (classpath, response) = pipeline
            .deliver(&mut txn, install)
            .expect("module installation is accepted");
        assert!(matches!(response, Response::InstallCodeSuccessful { .. }));

        let id = txn.commit().expect("the bootstrap batch commits");
        let tip = store.checkout_at(id);

        Self {
            store,
            tip,
            pipeline,
            executor,
            pair,
            gamete,
            classpath,
        }
    }

    /// A transformation drafting on the current tip.
    pub fn txn(&self) -> StoreTransformation {
        self.tip.begin_transformation(test_consensus(), 0)
    }

    /// Commits a transformation and moves the tip.
    pub fn commit(&mut self, txn: StoreTransformation) -> StateId {
        let id = txn.commit().expect("the batch commits");
        self.tip = self.store.checkout_at(id);
        id
    }

    /// The gamete's current nonce, from the tip.
    pub fn gamete_nonce(&self) -> BigInt {
        self.tip
            .get_field(&self.gamete, &shared_types::standard::nonce_field())
            .expect("the tip reads")
            .and_then(|value| value.as_big_integer().cloned())
            .unwrap_or_default()
    }

    /// The gamete's current balance, from the tip.
    pub fn gamete_balance(&self) -> BigInt {
        self.tip
            .get_field(&self.gamete, &shared_types::standard::balance_field())
            .expect("the tip reads")
            .and_then(|value| value.as_big_integer().cloned())
            .unwrap_or_default()
    }

    /// A signed constructor call for a counter starting at `initial`.
    pub fn construct_counter(&self, nonce: u64, initial: i32) -> Request {
        sign_with(
            Request::ConstructorCall {
                caller: self.gamete,
                nonce: nonce.into(),
                gas_limit: 10_000,
                gas_price: 1,
                chain_id: CHAIN_ID.to_string(),
                classpath: self.classpath,
                constructor: ConstructorSignature::new(COUNTER_CLASS, vec![StorageType::Int]),
                actuals: vec![StorageValue::Int(initial)],
                signature: vec![],
            },
            &self.pair,
        )
    }

    /// A signed instance method call on a counter.
    pub fn call_counter(
        &self,
        receiver: StorageReference,
        method: &str,
        actuals: Vec<StorageValue>,
        nonce: u64,
        view: bool,
    ) -> Request {
        let returns = Some(StorageType::Int);
        sign_with(
            Request::InstanceMethodCall {
                caller: self.gamete,
                nonce: nonce.into(),
                gas_limit: 10_000,
                gas_price: 1,
                chain_id: CHAIN_ID.to_string(),
                classpath: self.classpath,
                method: MethodSignature::new(
                    COUNTER_CLASS,
                    method,
                    actuals.iter().map(|_| StorageType::Int).collect(),
                    returns,
                ),
                receiver,
                actuals,
                view,
                signature: vec![],
            },
            &self.pair,
        )
    }
}

/// Signs a request's unsigned canonical bytes with `pair`.
pub fn sign_with(mut request: Request, pair: &Ed25519KeyPair) -> Request {
    let signature = pair.sign(&request.signed_payload());
    match &mut request {
        Request::InstallCode { signature: slot, .. }
        | Request::ConstructorCall { signature: slot, .. }
        | Request::InstanceMethodCall { signature: slot, .. }
        | Request::StaticMethodCall { signature: slot, .. } => *slot = signature,
        _ => {}
    }
    request
}
