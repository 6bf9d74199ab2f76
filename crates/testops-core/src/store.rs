//! Durable storage for custom scenarios and edited built-in prompts.
//!
//! Each collection lives under its own key as a JSON array. Reads never fail
//! to the caller: a missing or unreadable record becomes an empty collection
//! and a diagnostic. Writes always replace the whole collection.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::scenario::{BuiltinOverride, CustomScenario};

pub const CUSTOM_PROMPTS_KEY: &str = "custom_prompts";
pub const EDITED_BUILTIN_PROMPTS_KEY: &str = "edited_builtin_prompts";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store read failed for {key}: {message}")]
    Read { key: String, message: String },
    #[error("store write failed for {key}: {message}")]
    Write { key: String, message: String },
    #[error("store encode failed for {key}: {message}")]
    Encode { key: String, message: String },
}

pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per record under `root`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StoreError::Read {
                key: key.to_string(),
                message: format!("{}: {error}", path.display()),
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let write_error = |message: String| StoreError::Write {
            key: key.to_string(),
            message,
        };
        fs::create_dir_all(&self.root)
            .map_err(|error| write_error(format!("mkdir {}: {error}", self.root.display())))?;

        let path = self.path_for(key);
        let staging = self.root.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value)
            .map_err(|error| write_error(format!("write {}: {error}", staging.display())))?;
        fs::rename(&staging, &path)
            .map_err(|error| write_error(format!("rename to {}: {error}", path.display())))
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Read {
            key: key.to_string(),
            message: "memory store lock poisoned".to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Write {
            key: key.to_string(),
            message: "memory store lock poisoned".to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct PromptStore {
    backend: Arc<dyn KeyValueStore>,
}

impl PromptStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn file(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileKeyValueStore::new(root)))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::default()))
    }

    pub fn load_custom(&self) -> Vec<CustomScenario> {
        let entries: Vec<CustomScenario> = self.load_collection(CUSTOM_PROMPTS_KEY);
        dedupe_last_wins(entries, |entry| entry.name.clone())
    }

    pub fn save_custom(&self, entries: &[CustomScenario]) -> Result<(), StoreError> {
        self.save_collection(CUSTOM_PROMPTS_KEY, entries)
    }

    pub fn load_overrides(&self) -> Vec<BuiltinOverride> {
        let entries: Vec<BuiltinOverride> = self.load_collection(EDITED_BUILTIN_PROMPTS_KEY);
        dedupe_last_wins(entries, |entry| entry.scenario)
    }

    pub fn save_overrides(&self, entries: &[BuiltinOverride]) -> Result<(), StoreError> {
        self.save_collection(EDITED_BUILTIN_PROMPTS_KEY, entries)
    }

    fn load_collection<T>(&self, key: &str) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "prompt store record absent; starting empty");
                return Vec::new();
            }
            Err(error) => {
                tracing::warn!(key, error = %error, "prompt store read failed; starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(
                    key,
                    error = %error,
                    "prompt store record is malformed; starting empty"
                );
                Vec::new()
            }
        }
    }

    fn save_collection<T>(&self, key: &str, entries: &[T]) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let encoded = serde_json::to_string(entries).map_err(|error| StoreError::Encode {
            key: key.to_string(),
            message: error.to_string(),
        })?;
        self.backend.write(key, &encoded)?;
        tracing::debug!(key, entries = entries.len(), "prompt store record rewritten");
        Ok(())
    }
}

/// Keeps the position of the first occurrence but the value of the last.
fn dedupe_last_wins<T, K, F>(entries: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut deduped: Vec<T> = Vec::with_capacity(entries.len());
    for entry in entries {
        let key = key_of(&entry);
        if let Some(&index) = positions.get(&key) {
            deduped[index] = entry;
        } else {
            positions.insert(key, deduped.len());
            deduped.push(entry);
        }
    }
    deduped
}
