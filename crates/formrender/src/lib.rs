//! # Formrender - Component Rendering for Structured Forms
//!
//! `formrender` resolves short symbolic aliases (`fields.text`) to the code
//! that renders them, memoizes the expensive discovery work behind an
//! environment-aware TTL cache, runs submitted values through a two-source
//! sanitize/validate pipeline, and decides — via a two-tier override system
//! — which concrete template variant wraps each structural element of a
//! form.
//!
//! ## Core Concepts
//!
//! - [`ComponentRegistry`]: alias → factory and alias → metadata maps with
//!   lazy, cached companion discovery
//! - [`CompanionSource`]: host collaborator resolving companion type
//!   identifiers (normalizer/builder/validator/sanitizer/assets)
//! - [`pipeline`]: deterministic component-then-schema sanitize/validate
//!   execution with per-field warnings that never halt a render
//! - [`TemplateOverrides`]: form-wide defaults plus per-element overrides
//!   with hierarchical field → group → section → root fallback
//! - [`AssetAggregator`]: session-scoped script/style deduplication by
//!   handle
//!
//! Caching lives in the companion crate
//! [`formrender_cache`](formrender_cache), re-exported here as [`cache`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use formrender::{ComponentRegistry, RenderContext};
//!
//! let mut registry = ComponentRegistry::new("app::components", host_source)
//!     .with_builtins(["fields.text", "fields.select"])?
//!     .with_cache(cache);
//!
//! let ctx = RenderContext::new()
//!     .with_submitted("value", serde_json::json!("  Ada  "))
//!     .with_schema("value", field_schema);
//!
//! let rendered = registry.render("fields.text", ctx)?;
//! println!("{}", rendered.result.markup);
//! for (field, warnings) in &rendered.warnings {
//!     eprintln!("{field}: {warnings:?}");
//! }
//! ```
//!
//! ## Error Model
//!
//! Configuration errors (bad alias, unknown component, malformed factory
//! output, required field without validators) and resolution errors (empty
//! template type) fail fast via [`FormError`]. Cache failures degrade to
//! misses and never surface. Validation warnings are data on
//! [`Rendered`], not errors.
//!
//! ## Concurrency
//!
//! One registry/session instance is single-threaded; hooks and rules are
//! `Rc`-backed. Do not share an instance across concurrent executions —
//! the only safely shared resource is the cache backend, which is treated
//! as best-effort and eventually consistent.

pub mod assets;
pub mod component;
pub mod context;
pub mod error;
pub mod overrides;
pub mod pipeline;

/// The caching companion crate, re-exported.
pub use formrender_cache as cache;

pub use assets::AssetAggregator;
pub use component::{
    adapt_payload, validate_alias, AssetDef, AssetProvider, Builder, CompanionKind,
    CompanionSource, ComponentDefaults, ComponentMetadata, ComponentRegistry, ExternalComponent,
    Normalizer, RenderFn, RenderPayload, RenderResult, Rendered, SanitizerProvider,
    ValidatorProvider,
};
pub use context::{ContextCallback, RenderContext};
pub use error::{FormError, Result};
pub use overrides::{ElementKind, OverridesSnapshot, ResolveScope, TemplateOverrides};
pub use pipeline::{
    merge_rule_sets, normalize_schema_entry, sanitize_and_validate, PipelineReport, RuleBuckets,
    SanitizeRule, SchemaEntry, ValidateRule, ValidationRuleSet,
};
