//! The cache service proper.
//!
//! [`CacheService`] wraps a [`CacheBackend`] with the TTL policy, record
//! expiry stamps, namespaced keys, and the per-prefix key index that makes
//! bulk invalidation possible on backends without enumeration support.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::CacheBackend;
use crate::env::{ttl_for, Environment};
use crate::key::{build_key, index_key, CachePrefix};

/// Source of "now" for record stamping and expiry checks.
///
/// Injected so tests can drive time forward without sleeping.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now_secs(&self) -> u64;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Envelope written to the backend for every cached value.
///
/// `expires_at` is checked on every get regardless of whether the backend
/// honors TTLs natively; expired records are lazily evicted on read — there
/// is no background sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// The cached payload.
    pub data: Value,
    /// TTL the record was written with, in seconds.
    pub ttl_seconds: u64,
    /// Absolute expiry instant, seconds since the Unix epoch.
    pub expires_at: u64,
}

/// Namespaced, TTL-bound cache service.
///
/// All operations are best-effort: any backend failure degrades to a miss
/// (get) or a no-op (set/delete/clear) and is reported at most as a debug
/// trace. Callers must never rely on a value being present.
pub struct CacheService {
    backend: Rc<dyn CacheBackend>,
    clock: Rc<dyn Clock>,
    default_ttl: u64,
    shared: bool,
}

impl CacheService {
    /// Creates a service whose TTL policy is derived from the environment.
    ///
    /// In development the TTL is zero and the service is disabled: every get
    /// misses and every set is a no-op.
    pub fn new(backend: Rc<dyn CacheBackend>, env: &dyn Environment) -> Self {
        Self {
            backend,
            clock: Rc::new(SystemClock),
            default_ttl: ttl_for(env.current_environment()),
            shared: env.has_external_shared_cache(),
        }
    }

    /// Replaces the clock. Intended for tests.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// True when caching is active in this environment.
    pub fn is_enabled(&self) -> bool {
        self.default_ttl > 0
    }

    /// True when the backend is shared across processes.
    ///
    /// Sharing does not change the TTL, only whether population done by one
    /// process is visible to others.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// The TTL applied when a set does not specify one.
    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    /// Fetches the value under `key` in `prefix`, or `None` on miss, expiry,
    /// disabled caching, or backend failure.
    pub fn get(&self, key: &str, prefix: CachePrefix) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }

        let full_key = build_key(prefix, key);
        let raw = match self.backend.get(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::debug!("cache get failed for {full_key}: {err}");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_value(raw) {
            Ok(record) => record,
            // An unreadable record is as good as a miss; evict it.
            Err(_) => {
                self.evict(prefix, &full_key);
                return None;
            }
        };

        if record.expires_at <= self.clock.now_secs() {
            self.evict(prefix, &full_key);
            return None;
        }

        Some(record.data)
    }

    /// Lazy eviction: drops the record and its key-index entry, so the
    /// index does not accrete dead keys between `clear_all` calls.
    fn evict(&self, prefix: CachePrefix, full_key: &str) {
        let _ = self.backend.delete(full_key);
        self.index_remove(prefix, full_key);
    }

    /// Stores `value` under `key` in `prefix`.
    ///
    /// `ttl` overrides the environment default when given. Returns `true` if
    /// the backend accepted the write; `false` on disabled caching or any
    /// backend failure.
    pub fn set(&self, key: &str, value: Value, ttl: Option<u64>, prefix: CachePrefix) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let ttl_seconds = ttl.unwrap_or(self.default_ttl);
        let record = CacheRecord {
            data: value,
            ttl_seconds,
            expires_at: self.clock.now_secs() + ttl_seconds,
        };
        let payload = match serde_json::to_value(&record) {
            Ok(payload) => payload,
            Err(_) => return false,
        };

        let full_key = build_key(prefix, key);
        match self.backend.set(&full_key, payload, ttl_seconds) {
            Ok(true) => {
                self.index_add(prefix, &full_key);
                true
            }
            Ok(false) => false,
            Err(err) => {
                log::debug!("cache set failed for {full_key}: {err}");
                false
            }
        }
    }

    /// Deletes `key` in `prefix`. Returns `true` if a value was removed.
    pub fn delete(&self, key: &str, prefix: CachePrefix) -> bool {
        let full_key = build_key(prefix, key);
        let removed = match self.backend.delete(&full_key) {
            Ok(removed) => removed,
            Err(err) => {
                log::debug!("cache delete failed for {full_key}: {err}");
                false
            }
        };
        if removed {
            self.index_remove(prefix, &full_key);
        }
        removed
    }

    /// Deletes every key ever created under `prefix`, then the index itself.
    ///
    /// Works by iterating the persisted key index, since the backend is not
    /// required to support enumeration or prefix scans.
    pub fn clear_all(&self, prefix: CachePrefix) {
        for key in self.index_load(prefix) {
            let _ = self.backend.delete(&key);
        }
        let _ = self.backend.delete(&index_key(prefix));
    }

    fn index_load(&self, prefix: CachePrefix) -> Vec<String> {
        match self.backend.get(&index_key(prefix)) {
            Ok(Some(raw)) => serde_json::from_value(raw).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn index_store(&self, prefix: CachePrefix, keys: &[String]) {
        if let Ok(payload) = serde_json::to_value(keys) {
            // The index carries no expiry stamp; it lives until clear_all.
            let _ = self.backend.set(&index_key(prefix), payload, 0);
        }
    }

    fn index_add(&self, prefix: CachePrefix, full_key: &str) {
        let mut keys = self.index_load(prefix);
        if !keys.iter().any(|k| k == full_key) {
            keys.push(full_key.to_string());
            self.index_store(prefix, &keys);
        }
    }

    fn index_remove(&self, prefix: CachePrefix, full_key: &str) {
        let mut keys = self.index_load(prefix);
        let before = keys.len();
        keys.retain(|k| k != full_key);
        if keys.len() != before {
            self.index_store(prefix, &keys);
        }
    }
}
