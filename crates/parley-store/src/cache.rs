//! Time-bounded response cache.
//!
//! Keyed by a content hash of the request payload (see `key`). Lookups that
//! find an expired entry behave as a miss; the stale entry stays in the map
//! until the next save cycle prunes it. A JSON mirror under the data dir is
//! best-effort only, the in-memory map is authoritative for the session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// TTL for chat responses from the LLM proxy.
pub fn chat_response_ttl() -> Duration {
    Duration::minutes(5)
}

/// TTL for synthesized audio, which is stable per input text.
pub fn synth_audio_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: serde_json::Value,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    path: PathBuf,
}

impl ResponseCache {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            path: data_dir.join("cache.json"),
        }
    }

    /// Restore the persisted mirror. A missing or unreadable file starts
    /// the session with an empty cache.
    pub fn load(&self) {
        let restored: HashMap<String, CacheEntry> = match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => return,
        };
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        *entries = restored;
    }

    /// Valid entry or miss. Expired entries are not evicted here.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.data.clone())
    }

    pub fn put(&self, key: impl Into<String>, data: serde_json::Value, ttl: Duration) {
        let key = key.into();
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            data,
            stored_at: now,
            expires_at: now + ttl,
        };
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prune expired entries, then write the JSON mirror. Write failures
    /// are logged and swallowed; they never block the conversation flow.
    pub async fn persist(&self) {
        let snapshot = {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            entries.retain(|_, entry| !entry.is_expired());
            entries.clone()
        };

        if let Err(e) = self.write_mirror(&snapshot).await {
            tracing::warn!("failed to persist response cache: {e}");
        }
    }

    async fn write_mirror(&self, snapshot: &HashMap<String, CacheEntry>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
