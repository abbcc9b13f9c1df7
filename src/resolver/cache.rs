//! In-memory TTL cache for Vault KV responses.
//!
//! Repeated `vx exec` invocations in quick succession (watch tasks, test
//! loops) tend to hit the same handful of paths. The cache keeps each
//! path's KV data for a bounded time so those reads skip the network.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Fallback TTL when the caller supplies a zero duration.
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached KV response with its expiry instant.
struct CacheEntry {
    data: HashMap<String, String>,
    expires_at: Instant,
}

/// Thread-safe TTL cache of Vault path → KV data.
///
/// Entries expire strictly by wall clock; eviction is TTL-only (no size
/// bound — the working set is the handful of paths a config references).
/// Data is copied on both `set` and `get` so callers can never mutate a
/// stored entry through a returned or retained map.
pub struct Cache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Cache {
    /// Create a cache with the given TTL. A zero TTL selects the default
    /// of five minutes.
    pub fn new(ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };

        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return a copy of the cached data for `path`, or `None` on a miss or
    /// an expired entry.
    pub fn get(&self, path: &str) -> Option<HashMap<String, String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());

        let entry = entries.get(path)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }

        Some(entry.data.clone())
    }

    /// Store a copy of `data` under `path`, replacing any existing entry.
    pub fn set(&self, path: &str, data: &HashMap<String, String>) {
        let entry = CacheEntry {
            data: data.clone(),
            expires_at: Instant::now() + self.ttl,
        };

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(path.to_string(), entry);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}
