//! Component model: aliases, metadata, render results, assets.
//!
//! An alias is a dot-namespaced symbolic name (`fields.text`) resolving to
//! the code that renders it. Discovery produces a [`ComponentMetadata`]
//! record per alias describing which companion types exist; rendering
//! produces a [`RenderResult`]. Factories may return looser shapes
//! ([`RenderPayload`]) that are normalized once at the registry boundary.

pub mod discovery;
pub mod registry;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FormError, Result};

pub use discovery::{
    companion_candidate, discover_metadata, max_mtime, AssetProvider, Builder, CompanionKind,
    CompanionSource, Normalizer, SanitizerProvider, ValidatorProvider,
};
pub use registry::{ComponentRegistry, ExternalComponent, RenderFn};

/// Checks an alias against the key format `[A-Za-z0-9._-]+`.
///
/// Rejected aliases never reach a lookup or the cache layer.
pub fn validate_alias(alias: &str) -> Result<()> {
    let valid = !alias.is_empty()
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(FormError::InvalidAlias(alias.to_string()))
    }
}

/// A script or style declaration emitted by a render.
///
/// Identity is the `handle`; re-declaring a handle replaces the earlier
/// definition (last write wins, see [`crate::assets::AssetAggregator`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDef {
    /// Unique handle; the identity key for deduplication.
    pub handle: String,
    /// Source URL or path.
    pub src: String,
    /// Handles of assets this one depends on.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Asset version for cache busting.
    #[serde(default)]
    pub version: Option<String>,
    /// Scripts: whether placement is in the footer.
    #[serde(default)]
    pub in_footer: bool,
    /// Styles: target media query.
    #[serde(default)]
    pub media: Option<String>,
    /// Inline data attached alongside the asset.
    #[serde(default)]
    pub inline_data: Option<String>,
}

impl AssetDef {
    /// A script asset placed in the footer.
    pub fn script(handle: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            src: src.into(),
            deps: Vec::new(),
            version: None,
            in_footer: true,
            media: None,
            inline_data: None,
        }
    }

    /// A style asset for all media.
    pub fn style(handle: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            src: src.into(),
            deps: Vec::new(),
            version: None,
            in_footer: false,
            media: Some("all".to_string()),
            inline_data: None,
        }
    }

    /// Adds a dependency handle.
    pub fn with_dep(mut self, handle: impl Into<String>) -> Self {
        self.deps.push(handle.into());
        self
    }

    /// Sets the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// The immutable value produced by rendering one component instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderResult {
    /// The rendered markup.
    pub markup: String,
    /// Optional script declaration.
    #[serde(default)]
    pub script: Option<AssetDef>,
    /// Optional style declaration.
    #[serde(default)]
    pub style: Option<AssetDef>,
    /// True when the component needs the host's media machinery.
    #[serde(default)]
    pub requires_media: bool,
    /// True when the component may repeat within a group.
    #[serde(default)]
    pub repeatable: bool,
    /// Schema fragment describing the rendered fields.
    #[serde(default)]
    pub schema: Map<String, Value>,
}

impl RenderResult {
    /// A result holding only markup.
    pub fn markup(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            ..Self::default()
        }
    }
}

/// The shapes a raw factory is allowed to return.
///
/// Normalized once at the registry boundary via [`adapt_payload`]; anything
/// else is an "invalid factory contract" configuration error.
#[derive(Debug, Clone)]
pub enum RenderPayload {
    /// A complete render result.
    Result(RenderResult),
    /// A map with at least a `markup` key; remaining keys follow the
    /// [`RenderResult`] field names.
    Map(Map<String, Value>),
    /// Bare markup.
    Markup(String),
}

/// Adapts a factory payload into a [`RenderResult`].
///
/// # Errors
///
/// Returns [`FormError::InvalidFactoryContract`] when a map payload cannot
/// be read as a render result (most commonly: no `markup` key).
pub fn adapt_payload(alias: &str, payload: RenderPayload) -> Result<RenderResult> {
    match payload {
        RenderPayload::Result(result) => Ok(result),
        RenderPayload::Markup(markup) => Ok(RenderResult::markup(markup)),
        RenderPayload::Map(map) => {
            if !map.contains_key("markup") {
                return Err(FormError::InvalidFactoryContract {
                    alias: alias.to_string(),
                    reason: "map payload has no \"markup\" key".to_string(),
                });
            }
            serde_json::from_value(Value::Object(map)).map_err(|err| {
                FormError::InvalidFactoryContract {
                    alias: alias.to_string(),
                    reason: err.to_string(),
                }
            })
        }
    }
}

/// The full outcome of one render call: the result plus any validation
/// warnings and sanitizer notices, keyed by field id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rendered {
    /// The render result.
    pub result: RenderResult,
    /// Validation warnings per field id.
    #[serde(default)]
    pub warnings: HashMap<String, Vec<String>>,
    /// Sanitizer notices per field id.
    #[serde(default)]
    pub notices: HashMap<String, Vec<String>>,
}

impl Rendered {
    /// Wraps a bare result with no warnings or notices.
    pub fn clean(result: RenderResult) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }
}

/// Default rules and context a component declares for itself.
///
/// Rule entries are names, not callables, so the record round-trips through
/// the cache; the registry resolves names back to rules through the
/// component's sanitizer/validator companions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentDefaults {
    /// Names of the component's default sanitize rules, in order.
    #[serde(default)]
    pub sanitize: Vec<String>,
    /// Names of the component's default validate rules, in order.
    #[serde(default)]
    pub validate: Vec<String>,
    /// Default per-field context.
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Per-alias record produced by discovery.
///
/// All companion references are nullable; a component with no validator
/// simply has `validator_ref: None`, which is a normal state rather than an
/// error. The record is replaced wholesale on re-discovery, never partially
/// mutated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// Type identifier of the normalizer companion, if discovered.
    pub normalizer_ref: Option<String>,
    /// Type identifier of the builder companion, if discovered.
    pub builder_ref: Option<String>,
    /// Type identifier of the validator companion, if discovered.
    pub validator_ref: Option<String>,
    /// Type identifier of the sanitizer companion, if discovered.
    pub sanitizer_ref: Option<String>,
    /// Type identifier of the assets companion, if discovered.
    pub assets_ref: Option<String>,
    /// Defaults declared by the component.
    #[serde(default)]
    pub defaults: ComponentDefaults,
}
