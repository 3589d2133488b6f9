//! Façade-level flows: the full install-construct-call path through a
//! running node, and snapshot reads against historical states.

#[cfg(test)]
mod tests {
    use crate::fixtures::{counter_value_field, script_counter, sign_with, test_consensus, CHAIN_ID, COUNTER_CLASS};
    use shared_crypto::{Ed25519KeyPair, Sha256Hasher};
    use shared_types::{
        ConstructorSignature, Request, Response, StorageReference, StorageType, StorageValue,
    };
    use st_01_key_value::InMemoryKvs;
    use st_03_state_store::StateView;
    use st_04_execution::adapters::{OpaqueClassLoaderProvider, ScriptedExecutor};
    use st_05_node::{FixedTimeSource, LocalNodeConfig, Node, NodeApi};
    use std::sync::Arc;

    fn start_node() -> (Node, Arc<ScriptedExecutor>) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        let executor = Arc::new(ScriptedExecutor::new());
        script_counter(&executor);
        let node = Node::start(
            LocalNodeConfig::default(),
            Arc::new(InMemoryKvs::new()),
            Arc::new(Sha256Hasher),
            executor.clone(),
            Arc::new(OpaqueClassLoaderProvider),
            test_consensus(),
            Arc::new(FixedTimeSource::starting_at(1_700_000_000_000)),
        )
        .unwrap();
        (node, executor)
    }

    fn construct_counter(
        pair: &Ed25519KeyPair,
        caller: StorageReference,
        classpath: shared_types::TransactionReference,
        nonce: u64,
        initial: i32,
    ) -> Request {
        sign_with(
            Request::ConstructorCall {
                caller,
                nonce: nonce.into(),
                gas_limit: 10_000,
                gas_price: 1,
                chain_id: CHAIN_ID.to_string(),
                classpath,
                constructor: ConstructorSignature::new(COUNTER_CLASS, vec![StorageType::Int]),
                actuals: vec![StorageValue::Int(initial)],
                signature: vec![],
            },
            pair,
        )
    }

    fn call_counter(
        pair: &Ed25519KeyPair,
        caller: StorageReference,
        classpath: shared_types::TransactionReference,
        receiver: StorageReference,
        method: &str,
        actuals: Vec<StorageValue>,
        nonce: u64,
        view: bool,
    ) -> Request {
        sign_with(
            Request::InstanceMethodCall {
                caller,
                nonce: nonce.into(),
                gas_limit: 10_000,
                gas_price: 1,
                chain_id: CHAIN_ID.to_string(),
                classpath,
                method: shared_types::MethodSignature::new(
                    COUNTER_CLASS,
                    method,
                    actuals.iter().map(|_| StorageType::Int).collect(),
                    Some(StorageType::Int),
                ),
                receiver,
                actuals,
                view,
                signature: vec![],
            },
            pair,
        )
    }

    #[tokio::test]
    async fn test_full_counter_flow_through_the_node() {
        let (node, _) = start_node();
        let pair = Ed25519KeyPair::from_seed([7; 32]);
        let (gamete, classpath) = node
            .bootstrap(b"counter module".to_vec(), &pair, 1_000_000_000.into())
            .await
            .unwrap();

        // Construct a counter at 5.
        let response = node
            .add(construct_counter(&pair, gamete, classpath, 1, 5))
            .await
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter, got {response:?}");
        };

        // Increment twice, then read through a view call.
        for nonce in [2u64, 3] {
            let response = node
                .add(call_counter(
                    &pair, gamete, classpath, counter, "increment", vec![], nonce, false,
                ))
                .await
                .unwrap();
            assert!(matches!(response, Response::MethodSuccessful { .. }));
        }
        let response = node
            .add(call_counter(
                &pair, gamete, classpath, counter, "get", vec![], 4, true,
            ))
            .await
            .unwrap();
        let Response::MethodSuccessful { result, .. } = response else {
            panic!("expected the read to succeed");
        };
        assert_eq!(result, Some(StorageValue::Int(7)));

        // The folded object state agrees.
        let state = node.get_state(&counter).await.unwrap().unwrap();
        assert_eq!(state.class, COUNTER_CLASS);
        assert_eq!(
            state.field(&counter_value_field()),
            Some(&StorageValue::Int(7))
        );
    }

    #[tokio::test]
    async fn test_snapshot_reads_through_the_facade() {
        let (node, _) = start_node();
        let pair = Ed25519KeyPair::from_seed([8; 32]);
        let (gamete, classpath) = node
            .bootstrap(b"counter module".to_vec(), &pair, 1_000_000_000.into())
            .await
            .unwrap();

        let response = node
            .add(construct_counter(&pair, gamete, classpath, 1, 10))
            .await
            .unwrap();
        let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
            panic!("expected a constructed counter");
        };
        let s0 = node.state_id().await.unwrap();

        node.add(call_counter(
            &pair,
            gamete,
            classpath,
            counter,
            "set",
            vec![StorageValue::Int(99)],
            2,
            false,
        ))
        .await
        .unwrap();

        // The historical snapshot still shows 10; the tip shows 99.
        let old = node.store_at(s0);
        assert_eq!(
            old.get_field(&counter, &counter_value_field()).unwrap(),
            Some(StorageValue::Int(10))
        );
        let state = node.get_state(&counter).await.unwrap().unwrap();
        assert_eq!(
            state.field(&counter_value_field()),
            Some(&StorageValue::Int(99))
        );
    }
}
