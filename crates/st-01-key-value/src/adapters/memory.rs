//! In-memory implementation of the key-value port.
//!
//! The default adapter for tests and for nodes whose durability comes from
//! replaying an external log. A `RwLock` guards the maps; a poisoned lock
//! is reported as an error, not a panic.

use crate::errors::KvsError;
use crate::ports::{KeyValueStore, RootName};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub(crate) struct Committed {
    pub records: HashMap<Vec<u8>, Vec<u8>>,
    pub roots: HashMap<RootName, Vec<u8>>,
}

/// Writes staged by an open transaction. `None` marks a removal.
#[derive(Default)]
pub(crate) struct Staged {
    pub records: HashMap<Vec<u8>, Option<Vec<u8>>>,
    pub roots: HashMap<RootName, Option<Vec<u8>>>,
}

pub(crate) struct State {
    pub committed: Committed,
    pub staged: Option<Staged>,
}

impl State {
    pub(crate) fn new() -> Self {
        Self {
            committed: Committed::default(),
            staged: None,
        }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(staged) = &self.staged {
            if let Some(entry) = staged.records.get(key) {
                return entry.clone();
            }
        }
        self.committed.records.get(key).cloned()
    }

    pub(crate) fn get_root(&self, name: RootName) -> Option<Vec<u8>> {
        if let Some(staged) = &self.staged {
            if let Some(entry) = staged.roots.get(&name) {
                return entry.clone();
            }
        }
        self.committed.roots.get(&name).cloned()
    }

    pub(crate) fn write(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) {
        match &mut self.staged {
            Some(staged) => {
                staged.records.insert(key, value);
            }
            None => match value {
                Some(value) => {
                    self.committed.records.insert(key, value);
                }
                None => {
                    self.committed.records.remove(&key);
                }
            },
        }
    }

    pub(crate) fn write_root(&mut self, name: RootName, value: Option<Vec<u8>>) {
        match &mut self.staged {
            Some(staged) => {
                staged.roots.insert(name, value);
            }
            None => match value {
                Some(value) => {
                    self.committed.roots.insert(name, value);
                }
                None => {
                    self.committed.roots.remove(&name);
                }
            },
        }
    }

    pub(crate) fn begin(&mut self) -> Result<(), KvsError> {
        if self.staged.is_some() {
            return Err(KvsError::TransactionAlreadyOpen);
        }
        self.staged = Some(Staged::default());
        Ok(())
    }

    /// Folds the staged writes into the committed maps.
    pub(crate) fn apply_staged(&mut self) -> Result<usize, KvsError> {
        let staged = self.staged.take().ok_or(KvsError::NoTransaction)?;
        let written = staged.records.len() + staged.roots.len();
        for (key, value) in staged.records {
            match value {
                Some(value) => {
                    self.committed.records.insert(key, value);
                }
                None => {
                    self.committed.records.remove(&key);
                }
            }
        }
        for (name, value) in staged.roots {
            match value {
                Some(value) => {
                    self.committed.roots.insert(name, value);
                }
                None => {
                    self.committed.roots.remove(&name);
                }
            }
        }
        Ok(written)
    }

    pub(crate) fn rollback(&mut self) -> Result<(), KvsError> {
        self.staged.take().ok_or(KvsError::NoTransaction)?;
        Ok(())
    }
}

/// In-memory key-value store.
pub struct InMemoryKvs {
    state: RwLock<State>,
}

impl InMemoryKvs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::new()),
        }
    }

    /// Number of committed records; used by reclamation tests.
    pub fn record_count(&self) -> Result<usize, KvsError> {
        let state = self.state.read().map_err(|_| KvsError::LockPoisoned)?;
        Ok(state.committed.records.len())
    }
}

impl Default for InMemoryKvs {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryKvs {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvsError> {
        let state = self.state.read().map_err(|_| KvsError::LockPoisoned)?;
        Ok(state.get(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvsError> {
        let mut state = self.state.write().map_err(|_| KvsError::LockPoisoned)?;
        state.write(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), KvsError> {
        let mut state = self.state.write().map_err(|_| KvsError::LockPoisoned)?;
        state.write(key.to_vec(), None);
        Ok(())
    }

    fn get_root(&self, name: RootName) -> Result<Option<Vec<u8>>, KvsError> {
        let state = self.state.read().map_err(|_| KvsError::LockPoisoned)?;
        Ok(state.get_root(name))
    }

    fn set_root(&self, name: RootName, bytes: &[u8]) -> Result<(), KvsError> {
        let mut state = self.state.write().map_err(|_| KvsError::LockPoisoned)?;
        state.write_root(name, Some(bytes.to_vec()));
        Ok(())
    }

    fn begin(&self) -> Result<(), KvsError> {
        let mut state = self.state.write().map_err(|_| KvsError::LockPoisoned)?;
        state.begin()
    }

    fn commit(&self) -> Result<(), KvsError> {
        let mut state = self.state.write().map_err(|_| KvsError::LockPoisoned)?;
        let written = state.apply_staged()?;
        tracing::debug!("[st-01] committed {written} staged writes");
        Ok(())
    }

    fn rollback(&self) -> Result<(), KvsError> {
        let mut state = self.state.write().map_err(|_| KvsError::LockPoisoned)?;
        state.rollback()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let kvs = InMemoryKvs::new();
        kvs.put(b"k", b"v").unwrap();
        assert_eq!(kvs.get(b"k").unwrap(), Some(b"v".to_vec()));
        kvs.remove(b"k").unwrap();
        assert_eq!(kvs.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_transaction_reads_its_own_writes() {
        let kvs = InMemoryKvs::new();
        kvs.begin().unwrap();
        kvs.put(b"a", b"1").unwrap();
        assert_eq!(kvs.get(b"a").unwrap(), Some(b"1".to_vec()));
        kvs.commit().unwrap();
        assert_eq!(kvs.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_rollback_discards_writes_and_roots() {
        let kvs = InMemoryKvs::new();
        kvs.set_root(RootName::Info, b"old").unwrap();
        kvs.begin().unwrap();
        kvs.put(b"a", b"1").unwrap();
        kvs.set_root(RootName::Info, b"new").unwrap();
        kvs.rollback().unwrap();
        assert_eq!(kvs.get(b"a").unwrap(), None);
        assert_eq!(kvs.get_root(RootName::Info).unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn test_nested_begin_rejected() {
        let kvs = InMemoryKvs::new();
        kvs.begin().unwrap();
        assert!(matches!(kvs.begin(), Err(KvsError::TransactionAlreadyOpen)));
    }

    #[test]
    fn test_commit_without_begin_rejected() {
        let kvs = InMemoryKvs::new();
        assert!(matches!(kvs.commit(), Err(KvsError::NoTransaction)));
    }
}
