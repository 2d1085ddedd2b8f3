//! # Formrender Cache - Environment-Aware TTL Caching
//!
//! `formrender-cache` provides the caching layer for the `formrender` component
//! engine: a namespaced, TTL-bound key/value service layered over a pluggable
//! backend store.
//!
//! The crate is deliberately self-contained and can be used independently of
//! the rest of the framework.
//!
//! ## Core Concepts
//!
//! - [`CacheBackend`]: Trait for the external key/value store (a shared object
//!   cache, a process-local map, ...). See [`InMemoryBackend`] for the bundled
//!   implementation.
//! - [`Environment`]: Trait describing the deployment environment; the
//!   environment name selects the TTL policy (development disables caching
//!   outright).
//! - [`CacheService`]: The service itself. Keys are namespaced by
//!   [`CachePrefix`] so different resource classes never collide, and every
//!   key created under a prefix is tracked in a persisted index so
//!   [`CacheService::clear_all`] works even when the backend cannot enumerate
//!   its keys.
//!
//! ## Failure Semantics
//!
//! The cache is purely an optimization. Every backend error is swallowed and
//! degraded to a miss (on get) or a no-op (on set/delete); nothing above a
//! debug trace is ever emitted. Correctness must never depend on a cache hit.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use formrender_cache::{CachePrefix, CacheService, EnvName, FixedEnvironment, InMemoryBackend};
//!
//! let backend = Rc::new(InMemoryBackend::new());
//! let env = FixedEnvironment::new(EnvName::Production, false);
//! let cache = CacheService::new(backend, &env);
//!
//! cache.set("fields.text", serde_json::json!({"builder": "TextBuilder"}), None, CachePrefix::ComponentMetadata);
//! let hit = cache.get("fields.text", CachePrefix::ComponentMetadata);
//! assert!(hit.is_some());
//! ```

pub mod backend;
pub mod env;
pub mod key;
pub mod service;

pub use backend::{BackendError, CacheBackend, InMemoryBackend};
pub use env::{ttl_for, EnvName, Environment, FixedEnvironment};
pub use key::{build_key, index_key, CachePrefix, MAX_KEY_LEN};
pub use service::{CacheRecord, CacheService, Clock, SystemClock};
