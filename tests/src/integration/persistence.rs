//! Durability: a chain committed through the file-backed store survives a
//! process restart with its state identity and object states intact.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        counter_value_field, script_counter, sign_with, test_consensus, CHAIN_ID, COUNTER_CLASS,
    };
    use shared_crypto::{Ed25519KeyPair, Sha256Hasher};
    use shared_types::{
        ConstructorSignature, Request, Response, StorageType, StorageValue, TransactionReference,
    };
    use st_01_key_value::FileBackedKvs;
    use st_03_state_store::{StateView, Store};
    use st_04_execution::adapters::{OpaqueClassLoaderProvider, ScriptedExecutor};
    use st_04_execution::Pipeline;
    use std::sync::Arc;

    #[test]
    fn test_chain_survives_reopen_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chain.bin");
        let pair = Ed25519KeyPair::from_seed([11; 32]);

        let executor = Arc::new(ScriptedExecutor::new());
        script_counter(&executor);
        let pipeline = Pipeline::new(executor, Arc::new(OpaqueClassLoaderProvider));

        // First life: bootstrap and construct a counter at 33.
        let (id, counter) = {
            let kvs = Arc::new(FileBackedKvs::open(&path)?);
            let store = Store::open(kvs, Arc::new(Sha256Hasher))?;
            let mut txn = store.begin_transformation(test_consensus(), 0);

            let gamete_request = Request::GameteCreation {
                classpath: TransactionReference::new([0xEE; 32]),
                initial_amount: 1_000_000_000.into(),
                public_key: pair.public_key_hex(),
            };
            let (_, response) = pipeline.deliver(&mut txn, gamete_request)?;
            let Response::GameteCreated { gamete, .. } = response else {
                anyhow::bail!("expected a gamete response");
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
            let (classpath, _) = pipeline.deliver(&mut txn, install)?;

            let construct = sign_with(
                Request::ConstructorCall {
                    caller: gamete,
                    nonce: 1.into(),
                    gas_limit: 10_000,
                    gas_price: 1,
                    chain_id: CHAIN_ID.to_string(),
                    classpath,
                    constructor: ConstructorSignature::new(COUNTER_CLASS, vec![StorageType::Int]),
                    actuals: vec![StorageValue::Int(33)],
                    signature: vec![],
                },
                &pair,
            );
            let (_, response) = pipeline.deliver(&mut txn, construct)?;
            let Response::ConstructorSuccessful { new_object: counter, .. } = response else {
                anyhow::bail!("expected a constructed counter");
            };

            (txn.commit()?, counter)
        };

        // Second life: a fresh open must land on the same state.
        let kvs = Arc::new(FileBackedKvs::open(&path)?);
        let reopened = Store::open(kvs, Arc::new(Sha256Hasher))?;
        assert_eq!(reopened.id(), &id);
        assert_eq!(
            reopened.get_field(&counter, &counter_value_field())?,
            Some(StorageValue::Int(33))
        );
        let state = reopened.get_state(&counter)?.expect("the counter survived");
        assert_eq!(state.class, COUNTER_CLASS);
        Ok(())
    }
}
