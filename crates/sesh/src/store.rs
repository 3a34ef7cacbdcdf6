//! Local token and cache store.
//!
//! The backend credentials and a small rolling conversation cache live in a
//! JSON file under the config directory. The store is an opaque key-value
//! secret store to the rest of the client; tests swap in the in-memory
//! implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::SessionSummary;
use crate::error::{ClientError, ClientResult};

/// Well-known store keys.
pub const KEY_API_KEY: &str = "api_key";
pub const KEY_SESSION_TOKEN: &str = "session_token";
pub const KEY_SERVER_URL: &str = "server_url";

/// TTL after which a cached conversation list must be refreshed.
pub const SYNC_CACHE_TTL: Duration = Duration::from_secs(300);

/// Opaque key-value secret store.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> ClientResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn delete(&self, key: &str) -> ClientResult<()>;
}

/// File-backed store: one JSON object, written atomically via rename.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location (`~/.config/sesh/store.json`).
    pub fn default_location() -> ClientResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| ClientError::Store("no config directory available".into()))?
            .join("sesh");
        Ok(Self::new(dir.join("store.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> ClientResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| ClientError::Store(format!("reading store: {}", e)))?;
        serde_json::from_str(&raw).map_err(|e| ClientError::Store(format!("parsing store: {}", e)))
    }

    fn write_all(&self, values: &HashMap<String, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Store(format!("creating store dir: {}", e)))?;
        }
        let raw = serde_json::to_string_pretty(values)
            .map_err(|e| ClientError::Store(format!("serializing store: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)
            .map_err(|e| ClientError::Store(format!("writing store: {}", e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::Store(format!("replacing store: {}", e)))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn delete(&self, key: &str) -> ClientResult<()> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            debug!(key, "store key removed");
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.values.lock().expect("store poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.values
            .lock()
            .expect("store poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> ClientResult<()> {
        self.values.lock().expect("store poisoned").remove(key);
        Ok(())
    }
}

/// Rolling cache of the conversation list and recent message pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCache {
    pub conversations: Vec<SessionSummary>,
    /// Session id -> cached message page.
    pub message_cache: HashMap<String, Vec<Value>>,
    pub last_synced: DateTime<Utc>,
}

impl SyncCache {
    pub fn new(conversations: Vec<SessionSummary>, now: DateTime<Utc>) -> Self {
        Self {
            conversations,
            message_cache: HashMap::new(),
            last_synced: now,
        }
    }

    /// Whether a list refresh must be forced.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.last_synced);
        age.num_seconds() >= SYNC_CACHE_TTL.as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("store.json"));

        assert!(store.get(KEY_API_KEY).unwrap().is_none());
        store.set(KEY_API_KEY, "sk-123").unwrap();
        store.set(KEY_SERVER_URL, "http://backend").unwrap();
        assert_eq!(store.get(KEY_API_KEY).unwrap().as_deref(), Some("sk-123"));

        store.delete(KEY_API_KEY).unwrap();
        assert!(store.get(KEY_API_KEY).unwrap().is_none());
        // Unrelated key survives the delete.
        assert_eq!(
            store.get(KEY_SERVER_URL).unwrap().as_deref(),
            Some("http://backend")
        );
    }

    #[test]
    fn test_delete_missing_key_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("store.json"));
        store.delete("never-set").unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        store.set(KEY_SESSION_TOKEN, "tok").unwrap();
        assert_eq!(
            store.get(KEY_SESSION_TOKEN).unwrap().as_deref(),
            Some("tok")
        );
        store.delete(KEY_SESSION_TOKEN).unwrap();
        assert!(store.get(KEY_SESSION_TOKEN).unwrap().is_none());
    }

    #[test]
    fn test_cache_staleness_at_ttl_boundary() {
        let now = Utc::now();
        let cache = SyncCache::new(vec![], now);
        assert!(!cache.is_stale(now));
        assert!(!cache.is_stale(now + TimeDelta::seconds(299)));
        assert!(cache.is_stale(now + TimeDelta::seconds(300)));
        assert!(cache.is_stale(now + TimeDelta::seconds(301)));
    }
}
