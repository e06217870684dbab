//! JSON-snapshot key-value store.
//!
//! One file holds the whole persisted state as a flat JSON object, fronted by
//! an in-memory cache under an RwLock. Reads support partial key sets and
//! writes are patch-semantics: untouched keys survive every `set`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::{Settings, WarSession};
use crate::error::{Result, WarwatchError};

/// Well-known snapshot keys.
pub const KEY_WAR_SESSION: &str = "war_session";
pub const KEY_SETTINGS: &str = "settings";

/// File-backed snapshot store.
pub struct Store {
    path: PathBuf,
    cache: RwLock<Map<String, Value>>,
}

impl Store {
    /// Open (or create) the snapshot under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join("state.json");
        let cache = if path.exists() {
            let text = fs::read_to_string(&path)?;
            serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default()
        } else {
            Map::new()
        };
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Read a subset of keys. Missing keys are simply absent from the result.
    pub fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let cache = self.cache.read().map_err(|e| WarwatchError::Storage(e.to_string()))?;
        Ok(keys
            .iter()
            .filter_map(|k| cache.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    /// Merge a patch into the snapshot and persist it.
    pub fn set(&self, patch: Map<String, Value>) -> Result<()> {
        let mut cache = self.cache.write().map_err(|e| WarwatchError::Storage(e.to_string()))?;
        for (key, value) in patch {
            cache.insert(key, value);
        }
        self.persist(&cache)
    }

    /// Typed read of one key.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let cache = self.cache.read().map_err(|e| WarwatchError::Storage(e.to_string()))?;
        match cache.get(key) {
            Some(value) => Ok(serde_json::from_value(value.clone()).ok()),
            None => Ok(None),
        }
    }

    /// Typed write of one key.
    pub fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut patch = Map::new();
        patch.insert(key.to_string(), serde_json::to_value(value)?);
        self.set(patch)
    }

    /// Drop every key and persist the empty snapshot.
    pub fn reset(&self) -> Result<()> {
        let mut cache = self.cache.write().map_err(|e| WarwatchError::Storage(e.to_string()))?;
        cache.clear();
        self.persist(&cache)
    }

    fn persist(&self, cache: &Map<String, Value>) -> Result<()> {
        let text = serde_json::to_string_pretty(&Value::Object(cache.clone()))?;
        // Write-then-rename so a crash mid-write cannot truncate the snapshot.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load the persisted war session, defaulting when absent or malformed.
    pub fn war_session(&self) -> Result<WarSession> {
        let cache = self.cache.read().map_err(|e| WarwatchError::Storage(e.to_string()))?;
        Ok(WarSession::from_stored(cache.get(KEY_WAR_SESSION)))
    }

    /// Persist the whole war session.
    pub fn save_war_session(&self, session: &WarSession) -> Result<()> {
        self.set_value(KEY_WAR_SESSION, session)
    }

    /// Merge a patch into the persisted war session via a closure, so
    /// untouched session fields survive.
    pub fn patch_war_session(&self, patch: impl FnOnce(&mut WarSession)) -> Result<WarSession> {
        let mut session = self.war_session()?;
        patch(&mut session);
        self.save_war_session(&session)?;
        Ok(session)
    }

    /// Load settings, clamped, defaulting when absent.
    pub fn settings(&self) -> Result<Settings> {
        let cache = self.cache.read().map_err(|e| WarwatchError::Storage(e.to_string()))?;
        Ok(Settings::from_stored(cache.get(KEY_SETTINGS)))
    }

    /// Persist settings.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.set_value(KEY_SETTINGS, settings)
    }
}
