//! Keyed byte stores backing the Persistence Adapter

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::PersistenceError;

/// A durable key/value store. Keys are entity ids.
pub trait Store: Send {
    /// Reads the value under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Writes `data` under `key`, replacing any previous value
    fn set(&self, key: &str, data: &[u8]) -> Result<(), PersistenceError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;

    /// Every key currently stored
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;
}

/// In-memory store. Clones share the same data, so several coordinators
/// can persist into one store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_data<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> T,
    ) -> Result<T, PersistenceError> {
        let mut data = self.data.lock().map_err(|e| PersistenceError::Store {
            key: key.to_string(),
            reason: format!("Failed to acquire lock: {e}"),
        })?;
        Ok(f(&mut data))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.with_data(key, |data| data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        self.with_data(key, |data| {
            data.insert(key.to_string(), value.to_vec());
        })
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.with_data(key, |data| {
            data.remove(key);
        })
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        self.with_data("*", |data| data.keys().cloned().collect())
    }
}

/// One JSON file per key in a directory
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

const FILE_EXTENSION: &str = "json";

impl FileStore {
    /// Opens a store in `dir`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir.to_string_lossy(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", file_name, FILE_EXTENSION))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn set(&self, key: &str, data: &[u8]) -> Result<(), PersistenceError> {
        fs::write(self.path(key), data).map_err(|e| io_error(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        let dir_key = self.dir.to_string_lossy();
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| io_error(&dir_key, e))? {
            let path = entry.map_err(|e| io_error(&dir_key, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn io_error(key: &str, error: io::Error) -> PersistenceError {
    PersistenceError::Store {
        key: key.to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_data() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("Root", b"{}").unwrap();

        assert_eq!(other.get("Root").unwrap(), Some(b"{}".to_vec()));
        other.remove("Root").unwrap();
        assert_eq!(store.get("Root").unwrap(), None);
        // removing twice is fine
        store.remove("Root").unwrap();
    }

    #[test]
    fn file_store_writes_one_file_per_key() {
        let dir = std::env::temp_dir().join(format!("graft-store-{}", fastrand::u64(..)));
        let store = FileStore::open(&dir).unwrap();

        store.set("Display-1", b"{\"id\":\"Display-1\"}").unwrap();
        store.set("Browser-1", b"{}").unwrap();
        assert!(dir.join("Display-1.json").exists());
        assert_eq!(store.keys().unwrap(), vec!["Browser-1", "Display-1"]);
        assert_eq!(store.get("Missing").unwrap(), None);

        store.remove("Browser-1").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["Display-1"]);
        fs::remove_dir_all(&dir).unwrap();
    }
}
