use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

pub const AUTH_TOKEN_KEY: &str = "auth_token";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file {path} is not a JSON object: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("token store lock poisoned")]
    Poisoned,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Session-scoped store: lives exactly as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        guard.remove(key);
        Ok(())
    }
}

/// Durable store: a flat JSON object of strings on disk. A missing file reads
/// as empty; the file is created on first write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, format!("{text}\n")).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries)
    }
}

/// The cached auth token plus its two persistence scopes.
pub struct TokenStore {
    cache: Mutex<Option<String>>,
    durable: Box<dyn KeyValueStore>,
    session: Box<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(durable: Box<dyn KeyValueStore>, session: Box<dyn KeyValueStore>) -> Self {
        Self {
            cache: Mutex::new(None),
            durable,
            session,
        }
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    /// Writes the durable scope always and the session scope only when
    /// `remember` is set.
    pub fn save(&self, token: &str, remember: bool) -> Result<(), StoreError> {
        self.durable.set(AUTH_TOKEN_KEY, token)?;
        if remember {
            self.session.set(AUTH_TOKEN_KEY, token)?;
        }
        let mut cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        *cache = Some(token.to_string());
        Ok(())
    }

    /// The first hit in either scope is kept in the cache, so later lookups do
    /// not touch the stores until `save` or `clear`.
    pub fn token(&self) -> Result<Option<String>, StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(token) = cache.as_ref() {
            return Ok(Some(token.clone()));
        }
        let found = match self.durable.get(AUTH_TOKEN_KEY)? {
            Some(token) => Some(token),
            None => self.session.get(AUTH_TOKEN_KEY)?,
        };
        if let Some(token) = &found {
            *cache = Some(token.clone());
        }
        Ok(found)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        {
            let mut cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
            *cache = None;
        }
        self.session.remove(AUTH_TOKEN_KEY)?;
        self.durable.remove(AUTH_TOKEN_KEY)
    }
}
