//! Deployment environment descriptor and TTL policy.
//!
//! The host tells the cache which environment it is running in; the
//! environment name alone decides the TTL. Whether an external shared cache
//! backend exists changes only whether populated entries are visible across
//! processes, never how long they live.

use serde::{Deserialize, Serialize};

/// Deployment environment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvName {
    /// Local development: caching is disabled outright so edits take effect
    /// immediately.
    Development,
    /// Staging: short-lived cache entries.
    Staging,
    /// Production: entries live on the order of an hour.
    Production,
}

/// Seconds a cache record lives in the given environment.
///
/// A value of `0` means caching is disabled for that environment.
pub fn ttl_for(env: EnvName) -> u64 {
    match env {
        EnvName::Development => 0,
        EnvName::Staging => 30 * 60,
        EnvName::Production => 60 * 60,
    }
}

/// Host collaborator describing the current deployment environment.
pub trait Environment {
    /// The current environment name.
    fn current_environment(&self) -> EnvName;

    /// True when an external shared cache backend is configured, making
    /// cache population effectively shared across processes.
    fn has_external_shared_cache(&self) -> bool;
}

/// A fixed [`Environment`] for hosts with static configuration and for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedEnvironment {
    name: EnvName,
    shared: bool,
}

impl FixedEnvironment {
    /// Creates an environment descriptor with a fixed name and sharing flag.
    pub fn new(name: EnvName, shared: bool) -> Self {
        Self { name, shared }
    }
}

impl Environment for FixedEnvironment {
    fn current_environment(&self) -> EnvName {
        self.name
    }

    fn has_external_shared_cache(&self) -> bool {
        self.shared
    }
}
