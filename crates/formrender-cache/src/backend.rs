//! Backend trait for the external key/value store.
//!
//! The backend is a narrow collaborator interface: `get`, `set`, `delete`.
//! No ordering, atomicity, or enumeration guarantees are required of it;
//! the service layer ([`crate::CacheService`]) builds namespace clearing on
//! top of an explicit key index precisely because backends may not support
//! prefix scans.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Error produced by a cache backend operation.
///
/// Backends are free to fail for any reason (store unavailable, value
/// rejected, connection dropped). The service layer swallows every variant
/// and degrades to a miss/no-op, so this type exists mostly for backend
/// implementors and debug traces.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The store could not be reached.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The store rejected a write.
    #[error("cache backend rejected write for key \"{key}\": {message}")]
    WriteRejected { key: String, message: String },

    /// Any other backend failure.
    #[error("cache backend error: {0}")]
    Other(String),
}

/// External key/value store consumed by [`crate::CacheService`].
///
/// `ttl_seconds` is advisory: backends with native expiry may honor it, but
/// the service also stamps every record with its own `expires_at` and checks
/// it on read, so a backend that ignores TTLs entirely is still correct.
pub trait CacheBackend {
    /// Fetches the raw value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Value>, BackendError>;

    /// Stores `value` under `key`. Returns `true` if the write was accepted.
    fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<bool, BackendError>;

    /// Removes `key`. Returns `true` if a value was present.
    fn delete(&self, key: &str) -> Result<bool, BackendError>;
}

/// Process-local backend backed by a plain map.
///
/// Used in tests and in hosts without a shared object cache. Ignores
/// `ttl_seconds`; expiry is enforced by the service layer's record stamps.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RefCell<HashMap<String, Value>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries (index keys included).
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl CacheBackend for InMemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value, _ttl_seconds: u64) -> Result<bool, BackendError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.entries.borrow_mut().remove(key).is_some())
    }
}
