//! End-to-end scenarios over the state engine: install-then-call,
//! read-your-writes inside one batch, replay, gas exhaustion, user
//! exceptions and snapshot stability.

#[cfg(test)]
mod tests {
    use crate::fixtures::{counter_value_field, TestChain};
    use num_bigint::BigInt;
    use shared_types::{FailureCause, Response, StorageValue};
    use st_03_state_store::StateView;
    use st_04_execution::{
        ExecutionEffects, ExecutorOutcome, PipelineError, RejectionError,
    };

    #[test]
    fn test_install_then_construct_then_call() {
        let mut chain = TestChain::bootstrap();
        let nonce_before = chain.gamete_nonce();

        let mut txn = chain.txn();
        let (_, response) = chain
            .pipeline
            .deliver(&mut txn, chain.construct_counter(1, 10))
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter, got {response:?}");
        };

        let (call_ref, response) = chain
            .pipeline
            .deliver(
                &mut txn,
                chain.call_counter(counter, "set", vec![StorageValue::Int(7)], 2, false),
            )
            .unwrap();
        assert!(matches!(response, Response::MethodSuccessful { .. }));
        chain.commit(txn);

        // Both responses are committed and retrievable.
        assert!(chain.tip.get_response(&call_ref).unwrap().is_some());
        assert!(chain.tip.get_request(&call_ref).unwrap().is_some());

        // The receiver's history lists the call before its creation.
        let history = chain.tip.get_history(&counter).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], call_ref);

        // The caller paid twice: nonce moved by exactly 2.
        assert_eq!(chain.gamete_nonce(), nonce_before + BigInt::from(2));

        // And the field landed.
        assert_eq!(
            chain
                .tip
                .get_field(&counter, &counter_value_field())
                .unwrap(),
            Some(StorageValue::Int(7))
        );
    }

    #[test]
    fn test_read_your_writes_inside_one_batch() {
        let mut chain = TestChain::bootstrap();
        let mut txn = chain.txn();
        let (_, response) = chain
            .pipeline
            .deliver(&mut txn, chain.construct_counter(1, 0))
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter");
        };
        chain.commit(txn);

        // One batch: A sets the field to 7, B reads it back.
        let mut txn = chain.txn();
        chain
            .pipeline
            .deliver(
                &mut txn,
                chain.call_counter(counter, "set", vec![StorageValue::Int(7)], 2, false),
            )
            .unwrap();
        let (_, response) = chain
            .pipeline
            .deliver(&mut txn, chain.call_counter(counter, "get", vec![], 3, true))
            .unwrap();

        let Response::MethodSuccessful { result, .. } = response else {
            panic!("expected the read to succeed");
        };
        assert_eq!(result, Some(StorageValue::Int(7)));
    }

    #[test]
    fn test_replay_of_identical_bytes_is_rejected() {
        let mut chain = TestChain::bootstrap();
        let request = chain.construct_counter(1, 0);

        let mut txn = chain.txn();
        chain.pipeline.deliver(&mut txn, request.clone()).unwrap();
        let id_after_first = chain.commit(txn);

        // The very same bytes again: the nonce has moved, so Check
        // rejects before any charge, and nothing commits.
        let mut txn = chain.txn();
        let error = chain.pipeline.deliver(&mut txn, request).unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Rejected(RejectionError::NonceMismatch { .. })
        ));
        assert_eq!(txn.deliver_count(), 0);
        txn.abandon();
        assert_eq!(chain.tip.id(), &id_after_first);
    }

    #[test]
    fn test_gas_exhaustion_burns_limit_and_records_penalty() {
        let mut chain = TestChain::bootstrap();
        chain.executor.on("app.Counter.hog", |_, _, gas| {
            gas.charge_cpu(1_000_000)?;
            Ok(ExecutorOutcome::Success(ExecutionEffects::default()))
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

        let balance_before = chain.gamete_balance();
        let mut request = chain.call_counter(counter, "hog", vec![], 2, false);
        if let shared_types::Request::InstanceMethodCall { gas_limit, .. } = &mut request {
            *gas_limit = 100;
        }
        let request = crate::fixtures::sign_with(request, &chain.pair);

        let mut txn = chain.txn();
        let (_, response) = chain.pipeline.deliver(&mut txn, request).unwrap();
        chain.commit(txn);

        let Response::MethodFailed { cause, penalty, updates, gas, .. } = &response else {
            panic!("expected gas exhaustion, got {response:?}");
        };
        assert_eq!(cause, &FailureCause::OutOfGas);
        // The base dispatch charge went through, the rest is penalty.
        assert_eq!(gas.total() + penalty, 100);
        // Only the forced updates: balance decrement and nonce bump.
        assert_eq!(updates.len(), 2);
        assert_eq!(chain.gamete_balance(), balance_before - BigInt::from(100));
    }

    #[test]
    fn test_user_exception_is_stored_and_refunds() {
        let mut chain = TestChain::bootstrap();
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

        let balance_before = chain.gamete_balance();
        let mut txn = chain.txn();
        let (reference, response) = chain
            .pipeline
            .deliver(&mut txn, chain.call_counter(counter, "deny", vec![], 2, false))
            .unwrap();
        chain.commit(txn);

        let Response::MethodException { exception_class, message, gas, .. } = &response else {
            panic!("expected an exception response, got {response:?}");
        };
        assert_eq!(exception_class, "app.Denied");
        assert_eq!(message, "m");

        // The stored copy equals what the pipeline returned.
        assert_eq!(chain.tip.get_response(&reference).unwrap(), Some(response.clone()));

        // Unused gas came back: the final delta is consumed * price.
        assert_eq!(
            chain.gamete_balance(),
            balance_before - BigInt::from(gas.total())
        );
    }

    #[test]
    fn test_snapshots_survive_later_batches() {
        let mut chain = TestChain::bootstrap();
        let mut txn = chain.txn();
        let (_, response) = chain
            .pipeline
            .deliver(&mut txn, chain.construct_counter(1, 10))
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter");
        };
        let s0 = chain.commit(txn);

        let mut txn = chain.txn();
        chain
            .pipeline
            .deliver(
                &mut txn,
                chain.call_counter(counter, "set", vec![StorageValue::Int(99)], 2, false),
            )
            .unwrap();
        chain.commit(txn);

        // The old snapshot still yields the original value.
        let old = chain.store.checkout_at(s0);
        assert_eq!(
            old.get_field(&counter, &counter_value_field()).unwrap(),
            Some(StorageValue::Int(10))
        );
        assert_eq!(
            chain
                .tip
                .get_field(&counter, &counter_value_field())
                .unwrap(),
            Some(StorageValue::Int(99))
        );
    }
}
