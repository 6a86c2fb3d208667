//! Persistent client-side token storage.
//!
//! All pages go through [`Session`], which reads tokens from the backing
//! [`TokenStore`] at call time. Nothing caches a token, so a refresh written
//! by one page is visible to the next request made by any other.

use crate::model::TokenPair;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Canonical key for the bearer token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Canonical key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const LEGACY_ACCESS_TOKEN_KEY: &str = "accessToken";
const LEGACY_REFRESH_TOKEN_KEY: &str = "refreshToken";

/// String key-value storage, the analogue of browser local storage
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys; stores that can should apply them together
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// In-memory store, lost when the process exits
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("token store lock poisoned".into()))
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Store persisted as a flat JSON object on disk.
///
/// The file is re-read on every `get` so that a token written by another
/// process (e.g. a separate `login` invocation) is observed.
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) if s.trim().is_empty() => Ok(HashMap::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                Error::Storage(format!("corrupt token file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::Storage(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
            }
        }
        let body = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::Storage(format!("failed to serialize tokens: {}", e)))?;
        // Rename over the old file so readers never see a half-written one
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            Error::Storage(format!("failed to replace {}: {}", self.path.display(), e))
        })
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _lock = self
            .guard
            .lock()
            .map_err(|_| Error::Storage("token file lock poisoned".into()))?;
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|m| {
            m.remove(key);
        })
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|m| {
            for (key, value) in entries {
                m.insert(key.to_string(), value.to_string());
            }
        })
    }
}

/// The one accessor through which pages read and write credentials
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Session backed by a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Current bearer token, read from storage on every call
    pub fn access_token(&self) -> Result<Option<String>> {
        self.read_migrating(ACCESS_TOKEN_KEY, LEGACY_ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.read_migrating(REFRESH_TOKEN_KEY, LEGACY_REFRESH_TOKEN_KEY)
    }

    /// Persist both tokens under the canonical keys in one write
    pub fn store_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.store.set_many(&[
            (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
            (REFRESH_TOKEN_KEY, tokens.refresh_token.as_str()),
        ])
    }

    pub fn clear(&self) -> Result<()> {
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            LEGACY_ACCESS_TOKEN_KEY,
            LEGACY_REFRESH_TOKEN_KEY,
        ] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    // Older builds wrote camelCase keys; move them over on first read.
    fn read_migrating(&self, key: &str, legacy: &str) -> Result<Option<String>> {
        if let Some(v) = self.store.get(key)? {
            return Ok(Some(v));
        }
        match self.store.get(legacy)? {
            Some(v) => {
                log::debug!("migrating token from legacy key {} to {}", legacy, key);
                self.store.set(key, &v)?;
                self.store.remove(legacy)?;
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }
}
