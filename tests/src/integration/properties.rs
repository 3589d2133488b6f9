//! Engine-level properties: permutation determinism, history-fold
//! equality, checkout stability and the gas bound.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        counter_value_field, script_counter, sign_with, test_consensus, TestChain, CHAIN_ID,
        COUNTER_CLASS,
    };
    use shared_crypto::{Ed25519KeyPair, Sha256Hasher};
    use shared_types::{
        ConstructorSignature, FieldSignature, Request, Response, StorageType, StorageValue,
        TransactionReference, Update,
    };
    use st_01_key_value::InMemoryKvs;
    use st_03_state_store::{ObjectState, StateId, StateView, Store};
    use st_04_execution::adapters::{OpaqueClassLoaderProvider, ScriptedExecutor};
    use st_04_execution::{ExecutionEffects, ExecutorOutcome, Pipeline};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// The request family of two independent callers. Each stream is one
    /// caller's gamete creation, module installation and counter
    /// construction, in nonce order; the two streams touch disjoint
    /// objects, so any interleaving preserving each stream's order is a
    /// valid schedule.
    fn two_caller_streams(store: &Store) -> [Vec<Request>; 2] {
        let mut streams: Vec<Vec<Request>> = Vec::new();
        for (seed, tag) in [(1u8, 0xAAu8), (2, 0xBB)] {
            let pair = Ed25519KeyPair::from_seed([seed; 32]);
            let gamete_request = Request::GameteCreation {
                classpath: TransactionReference::new([tag; 32]),
                initial_amount: 1_000_000_000.into(),
                public_key: pair.public_key_hex(),
            };
            let gamete = shared_types::StorageReference::new(
                store.reference_of(&gamete_request),
                0,
            );
            let install = sign_with(
                Request::InstallCode {
                    caller: gamete,
                    nonce: 0.into(),
                    gas_limit: 100_000,
                    gas_price: 1,
                    chain_id: CHAIN_ID.to_string(),
                    classpath: TransactionReference::new([tag; 32]),
                    module: format!("module {tag}").into_bytes(),
                    dependencies: vec![],
                    signature: vec![],
                },
                &pair,
            );
            let classpath = store.reference_of(&install);
            let construct = sign_with(
                Request::ConstructorCall {
                    caller: gamete,
                    nonce: 1.into(),
                    gas_limit: 10_000,
                    gas_price: 1,
                    chain_id: CHAIN_ID.to_string(),
                    classpath,
                    constructor: ConstructorSignature::new(COUNTER_CLASS, vec![StorageType::Int]),
                    actuals: vec![StorageValue::Int(i32::from(seed))],
                    signature: vec![],
                },
                &pair,
            );
            streams.push(vec![gamete_request, install, construct]);
        }
        [streams.remove(0), streams.remove(0)]
    }

    /// Delivers the two streams merged by `schedule` (false pops from the
    /// first stream, true from the second) and returns the committed id.
    fn run_schedule(schedule: &[bool]) -> StateId {
        let store = Store::open(Arc::new(InMemoryKvs::new()), Arc::new(Sha256Hasher)).unwrap();
        let executor = Arc::new(ScriptedExecutor::new());
        script_counter(&executor);
        let pipeline = Pipeline::new(executor, Arc::new(OpaqueClassLoaderProvider));

        let [stream_a, stream_b] = two_caller_streams(&store);
        let mut streams = [stream_a.into_iter(), stream_b.into_iter()];

        let mut txn = store.begin_transformation(test_consensus(), 0);
        for &pick in schedule {
            let request = streams[usize::from(pick)]
                .next()
                .expect("the schedule pops each stream exactly three times");
            pipeline.deliver(&mut txn, request).unwrap();
        }
        txn.commit().unwrap()
    }

    #[test]
    fn test_nonce_consistent_permutations_reach_the_same_state() {
        let sequential = run_schedule(&[false, false, false, true, true, true]);
        let interleaved = run_schedule(&[true, false, true, false, false, true]);
        assert_eq!(sequential, interleaved);
    }

    #[test]
    fn test_random_interleavings_reach_the_same_state() {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let baseline = run_schedule(&[false, false, false, true, true, true]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..5 {
            let mut schedule = vec![false, false, false, true, true, true];
            schedule.shuffle(&mut rng);
            assert_eq!(run_schedule(&schedule), baseline, "schedule {schedule:?}");
        }
    }

    #[test]
    fn test_get_state_equals_the_history_fold() {
        let mut chain = TestChain::bootstrap();
        let mut txn = chain.txn();
        let (_, response) = chain
            .pipeline
            .deliver(&mut txn, chain.construct_counter(1, 5))
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter");
        };
        chain.commit(txn);

        for (nonce, value) in [(2u64, 20), (3, 30)] {
            let mut txn = chain.txn();
            chain
                .pipeline
                .deliver(
                    &mut txn,
                    chain.call_counter(counter, "set", vec![StorageValue::Int(value)], nonce, false),
                )
                .unwrap();
            chain.commit(txn);
        }

        // Manual newest-first fold over the history.
        let mut fields: BTreeMap<FieldSignature, StorageValue> = BTreeMap::new();
        let mut class = None;
        for reference in chain.tip.get_history(&counter).unwrap() {
            let response = chain.tip.get_response(&reference).unwrap().unwrap();
            for update in response.updates() {
                if update.object() != &counter {
                    continue;
                }
                match update {
                    Update::ClassTag { class: tag, .. } => class = Some(tag.clone()),
                    Update::Field { field, value, .. } => {
                        fields.entry(field.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
            if class.is_some() {
                break;
            }
        }

        let folded = ObjectState {
            class: class.unwrap(),
            fields,
        };
        assert_eq!(chain.tip.get_state(&counter).unwrap().unwrap(), folded);
        assert_eq!(
            folded.field(&counter_value_field()),
            Some(&StorageValue::Int(30))
        );
    }

    #[test]
    fn test_checkout_of_own_id_reads_identically() {
        let mut chain = TestChain::bootstrap();
        let mut txn = chain.txn();
        let (reference, _) = chain
            .pipeline
            .deliver(&mut txn, chain.construct_counter(1, 1))
            .unwrap();
        chain.commit(txn);

        let reopened = chain.store.checkout_at(*chain.tip.id());
        assert_eq!(
            reopened.get_response(&reference).unwrap(),
            chain.tip.get_response(&reference).unwrap()
        );
        assert_eq!(
            reopened.get_request(&reference).unwrap(),
            chain.tip.get_request(&reference).unwrap()
        );
    }

    #[test]
    fn test_gas_consumption_never_exceeds_the_limit() {
        let mut chain = TestChain::bootstrap();
        chain.executor.on("app.Counter.hog", |_, _, gas| {
            gas.charge_cpu(1_000_000)?;
            Ok(ExecutorOutcome::Success(ExecutionEffects::default()))
        });
        chain.executor.on("app.Counter.deny", |_, _, gas| {
            gas.charge_cpu(5)?;
            Ok(ExecutorOutcome::Exception {
                class: "app.Denied".to_string(),
                message: "m".to_string(),
                effects: ExecutionEffects::default(),
            })
        });

        let mut txn = chain.txn();
        let (_, response) = chain
            .pipeline
            .deliver(&mut txn, chain.construct_counter(1, 0))
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter");
        };
        chain.commit(txn);

        let mut delivered = Vec::new();
        let mut txn = chain.txn();
        for (nonce, method) in [(2u64, "set"), (3, "hog"), (4, "deny"), (5, "get")] {
            let actuals = if method == "set" {
                vec![StorageValue::Int(1)]
            } else {
                vec![]
            };
            let mut request = chain.call_counter(counter, method, actuals, nonce, false);
            if method == "hog" {
                if let Request::InstanceMethodCall { gas_limit, .. } = &mut request {
                    *gas_limit = 100;
                }
                request = sign_with(request, &chain.pair);
            }
            let (reference, _) = chain.pipeline.deliver(&mut txn, request).unwrap();
            delivered.push(reference);
        }
        chain.commit(txn);

        for reference in delivered {
            let request = chain.tip.get_request(&reference).unwrap().unwrap();
            let response = chain.tip.get_response(&reference).unwrap().unwrap();
            let gas = response.gas();
            let limit = request.gas_limit().unwrap();
            assert!(
                gas.total() + response.penalty() <= limit,
                "gas {} + penalty {} exceeds limit {limit} for {reference}",
                gas.total(),
                response.penalty()
            );
        }
    }
}
