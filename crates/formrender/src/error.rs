//! Error types for the component engine.
//!
//! The taxonomy is deliberately small. Configuration errors (bad alias,
//! unknown component, malformed factory output, a required field with no
//! validators) and resolution errors (empty template type) fail fast and
//! propagate to the caller. Cache failures never appear here — the cache
//! layer swallows them. Validation warnings are data, not errors; they ride
//! on [`crate::component::Rendered`].

use thiserror::Error;

/// Error type for registry, pipeline, and resolver operations.
#[derive(Debug, Error)]
pub enum FormError {
    /// Alias does not match `[A-Za-z0-9._-]+`. Rejected before any lookup.
    #[error("invalid key format: \"{0}\"")]
    InvalidAlias(String),

    /// Alias is in neither the live factory map nor the late-binding source.
    #[error("unknown component: \"{0}\"")]
    UnknownComponent(String),

    /// A factory produced something that cannot be adapted to a render
    /// result (e.g. a map payload with no markup).
    #[error("invalid factory contract for \"{alias}\": {reason}")]
    InvalidFactoryContract { alias: String, reason: String },

    /// A field requires validation but ended up with zero validators in
    /// both buckets after merging. Raised at registration, not at submit.
    #[error("field \"{0}\" requires validation but has no validators")]
    NoValidators(String),

    /// `resolve_template` was called with an empty template type.
    #[error("template type must not be empty")]
    EmptyTemplateType,

    /// A host-supplied factory or normalizer failed.
    #[error(transparent)]
    Factory(#[from] anyhow::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormError>;
