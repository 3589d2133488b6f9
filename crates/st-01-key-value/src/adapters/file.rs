//! File-backed implementation of the key-value port.
//!
//! Persists records to a single binary file, loaded fully on open and
//! rewritten on commit. Good enough for development nodes and tests that
//! must survive a restart; production deployments are expected to plug a
//! real database behind the port.
//!
//! File format, repeated to end of file:
//! `[kind u8][key_len u32 LE][key][value_len u32 LE][value]`
//! where kind 0 is a record and kind 1 a named root (key = root name).

use crate::adapters::memory::State;
use crate::errors::KvsError;
use crate::ports::{KeyValueStore, RootName};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const KIND_RECORD: u8 = 0;
const KIND_ROOT: u8 = 1;

/// Key-value store persisted to one file, rewritten on every commit.
pub struct FileBackedKvs {
    state: RwLock<State>,
    path: PathBuf,
}

impl FileBackedKvs {
    /// Opens the store at `path`, loading any existing content.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KvsError> {
        let path = path.as_ref().to_path_buf();
        let mut state = State::new();

        match std::fs::metadata(&path) {
            Ok(metadata) => {
                tracing::info!(
                    "[st-01] found existing store file: {} ({} bytes)",
                    path.display(),
                    metadata.len()
                );
                let (records, roots) = Self::load(&path)?;
                state.committed.records = records;
                state.committed.roots = roots;
            }
            Err(_) => {
                tracing::info!("[st-01] no store file at {}, starting empty", path.display());
            }
        }

        Ok(Self {
            state: RwLock::new(state),
            path,
        })
    }

    fn load(
        path: &Path,
    ) -> Result<(HashMap<Vec<u8>, Vec<u8>>, HashMap<RootName, Vec<u8>>), KvsError> {
        let mut file = std::fs::File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut records = HashMap::new();
        let mut roots = HashMap::new();
        let mut cursor = 0usize;

        while cursor < bytes.len() {
            let kind = bytes[cursor];
            cursor += 1;
            let key = Self::read_chunk(&bytes, &mut cursor)?;
            let value = Self::read_chunk(&bytes, &mut cursor)?;
            match kind {
                KIND_RECORD => {
                    records.insert(key, value);
                }
                KIND_ROOT => {
                    if let Some(name) = Self::root_from_key(&key) {
                        roots.insert(name, value);
                    }
                }
                other => {
                    return Err(KvsError::Io(format!("corrupt store file: kind byte {other}")));
                }
            }
        }

        Ok((records, roots))
    }

    fn read_chunk(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>, KvsError> {
        if *cursor + 4 > bytes.len() {
            return Err(KvsError::Io("corrupt store file: truncated length".into()));
        }
        let len =
            u32::from_le_bytes(bytes[*cursor..*cursor + 4].try_into().unwrap()) as usize;
        *cursor += 4;
        if *cursor + len > bytes.len() {
            return Err(KvsError::Io("corrupt store file: truncated chunk".into()));
        }
        let chunk = bytes[*cursor..*cursor + len].to_vec();
        *cursor += len;
        Ok(chunk)
    }

    fn root_from_key(key: &[u8]) -> Option<RootName> {
        RootName::ALL
            .into_iter()
            .find(|name| name.as_str().as_bytes() == key)
    }

    fn persist(&self, state: &State) -> Result<(), KvsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write to a sibling temp file, then rename over the old one, so a
        // crash mid-write leaves the previous commit intact.
        let tmp = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        let mut buf = Vec::new();

        for (key, value) in &state.committed.records {
            Self::write_entry(&mut buf, KIND_RECORD, key, value);
        }
        for (name, value) in &state.committed.roots {
            Self::write_entry(&mut buf, KIND_ROOT, name.as_str().as_bytes(), value);
        }

        file.write_all(&buf)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn write_entry(buf: &mut Vec<u8>, kind: u8, key: &[u8], value: &[u8]) {
        buf.push(kind);
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value);
    }
}

impl KeyValueStore for FileBackedKvs {
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
        self.persist(&state)?;
        tracing::debug!(
            "[st-01] committed {written} writes to {}",
            self.path.display()
        );
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
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");

        {
            let kvs = FileBackedKvs::open(&path).unwrap();
            kvs.begin().unwrap();
            kvs.put(b"k1", b"v1").unwrap();
            kvs.set_root(RootName::Responses, b"root-bytes").unwrap();
            kvs.commit().unwrap();
        }

        let reopened = FileBackedKvs::open(&path).unwrap();
        assert_eq!(reopened.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(
            reopened.get_root(RootName::Responses).unwrap(),
            Some(b"root-bytes".to_vec())
        );
    }

    #[test]
    fn test_rolled_back_writes_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");

        {
            let kvs = FileBackedKvs::open(&path).unwrap();
            kvs.begin().unwrap();
            kvs.put(b"keep", b"1").unwrap();
            kvs.commit().unwrap();
            kvs.begin().unwrap();
            kvs.put(b"drop", b"2").unwrap();
            kvs.rollback().unwrap();
        }

        let reopened = FileBackedKvs::open(&path).unwrap();
        assert_eq!(reopened.get(b"keep").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reopened.get(b"drop").unwrap(), None);
    }
}
