//! API key storage.
//!
//! The key is obfuscated at rest (reversed base64 — deterrence against casual
//! snapshot inspection, not cryptography) and cached in memory once loaded.

use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::Result;
use crate::store::Store;

const KEY_STORAGE_KEY: &str = "api_key_obfuscated";

/// Obfuscate a key for persistence. Empty input yields an empty string.
pub fn obfuscate(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    BASE64.encode(key).chars().rev().collect()
}

/// Reverse [`obfuscate`]. Malformed input yields an empty string.
pub fn deobfuscate(stored: &str) -> String {
    if stored.is_empty() {
        return String::new();
    }
    let forward: String = stored.chars().rev().collect();
    BASE64
        .decode(forward)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

/// Store-backed key source with an in-memory cache.
pub struct KeyStore {
    store: Arc<Store>,
    cached: Mutex<Option<String>>,
}

impl KeyStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    /// Load the key, from cache if warm. Returns `None` when unconfigured.
    pub fn api_key(&self) -> Result<Option<String>> {
        if let Some(key) = self.cached.lock().expect("key cache poisoned").clone() {
            return Ok(Some(key));
        }
        let stored = self
            .store
            .get_value::<String>(KEY_STORAGE_KEY)?
            .map(|s| deobfuscate(&s))
            .filter(|s| !s.is_empty());
        if let Some(ref key) = stored {
            *self.cached.lock().expect("key cache poisoned") = Some(key.clone());
        }
        Ok(stored)
    }

    /// Persist a new key (or clear it with an empty string).
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let trimmed = key.trim();
        *self.cached.lock().expect("key cache poisoned") =
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        self.store.set_value(KEY_STORAGE_KEY, &obfuscate(trimmed))
    }

    /// Whether any key is persisted.
    pub fn has_key(&self) -> Result<bool> {
        Ok(self.api_key()?.is_some())
    }

    /// Drop the in-memory cache (after a reset).
    pub fn clear_cache(&self) {
        *self.cached.lock().expect("key cache poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (Arc<Store>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        (store, dir)
    }

    #[test]
    fn test_obfuscate_roundtrip() {
        for key in ["abc123XYZ", "k", "longer-key-with-dashes-0987654321"] {
            assert_eq!(deobfuscate(&obfuscate(key)), key);
        }
    }

    #[test]
    fn test_obfuscate_is_not_identity() {
        assert_ne!(obfuscate("secretkey"), "secretkey");
    }

    #[test]
    fn test_empty_and_malformed() {
        assert_eq!(obfuscate(""), "");
        assert_eq!(deobfuscate(""), "");
        assert_eq!(deobfuscate("!!!not-base64!!!"), "");
    }

    #[test]
    fn test_keystore_set_get() {
        let (store, _dir) = temp_store();
        let keys = KeyStore::new(store.clone());
        assert!(!keys.has_key().unwrap());

        keys.set_api_key("  myapikey  ").unwrap();
        assert_eq!(keys.api_key().unwrap().as_deref(), Some("myapikey"));

        // Key is obfuscated in the underlying store.
        let raw: String = store.get_value(KEY_STORAGE_KEY).unwrap().unwrap();
        assert_ne!(raw, "myapikey");

        // A fresh KeyStore over the same store reads it back.
        let keys2 = KeyStore::new(store);
        assert_eq!(keys2.api_key().unwrap().as_deref(), Some("myapikey"));
    }

    #[test]
    fn test_keystore_clear() {
        let (store, _dir) = temp_store();
        let keys = KeyStore::new(store);
        keys.set_api_key("something").unwrap();
        keys.set_api_key("").unwrap();
        assert!(!keys.has_key().unwrap());
    }
}
