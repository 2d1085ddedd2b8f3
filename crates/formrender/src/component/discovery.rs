//! Companion discovery.
//!
//! Every alias may have up to five companion types — normalizer, builder,
//! validator, sanitizer, assets — resolved by naming convention from the
//! alias's dot segments and a base namespace (built-ins), or from an
//! explicitly supplied namespace (external registrations). Candidate
//! derivation is a pure string mapping; whether a candidate actually exists
//! and satisfies the required capability is answered by the host through
//! the [`CompanionSource`] collaborator.
//!
//! A missing companion is a normal, expected state: a component with no
//! validator simply gets `validator_ref: None` in its metadata.

use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use serde_json::Map;

use crate::component::{AssetDef, ComponentDefaults, ComponentMetadata, RenderPayload, RenderResult};
use crate::context::RenderContext;
use crate::pipeline::{SanitizeRule, ValidateRule};

/// The five companion roles an alias can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionKind {
    /// Normalizes context and renders through the validation pipeline.
    Normalizer,
    /// Renders directly, without the pipeline.
    Builder,
    /// Supplies the component's default validate rules.
    Validator,
    /// Supplies the component's default sanitize rules.
    Sanitizer,
    /// Supplies the component's script/style declarations.
    Assets,
}

impl CompanionKind {
    /// The type-name suffix used in candidate identifiers.
    pub fn suffix(&self) -> &'static str {
        match self {
            CompanionKind::Normalizer => "Normalizer",
            CompanionKind::Builder => "Builder",
            CompanionKind::Validator => "Validator",
            CompanionKind::Sanitizer => "Sanitizer",
            CompanionKind::Assets => "Assets",
        }
    }
}

/// Derives the candidate type identifier for one companion of an alias.
///
/// Alias segments map to namespace segments: alias `fields.text` under
/// namespace `app::components` yields
/// `app::components::fields::text::Normalizer` (and so on per kind).
/// Purely a string mapping; existence is checked separately.
pub fn companion_candidate(alias: &str, namespace: &str, kind: CompanionKind) -> String {
    let path = alias.split('.').collect::<Vec<_>>().join("::");
    format!("{namespace}::{path}::{}", kind.suffix())
}

/// Companion that normalizes context and renders via the pipeline.
///
/// When a normalizer is present, the registry wraps it so each render call
/// normalizes the context, runs the sanitize/validate pipeline over the
/// submitted values, and then lets the normalizer produce the payload.
pub trait Normalizer {
    /// Adjusts the context before the pipeline runs. Default: no-op.
    fn normalize(&self, _ctx: &mut RenderContext) {}

    /// Default per-field context merged into rule sets.
    fn default_context(&self) -> Map<String, serde_json::Value> {
        Map::new()
    }

    /// Produces the render result from the normalized, sanitized context.
    fn render(&self, ctx: &RenderContext) -> anyhow::Result<RenderResult>;
}

/// Companion that renders directly ("raw" factory, no pipeline).
pub trait Builder {
    /// Produces a payload; the registry adapts it into a [`RenderResult`].
    fn build(&self, ctx: &RenderContext) -> anyhow::Result<RenderPayload>;
}

/// Companion supplying the component's default sanitize rules.
pub trait SanitizerProvider {
    /// The rules, in declaration order.
    fn rules(&self) -> Vec<SanitizeRule>;
}

/// Companion supplying the component's default validate rules.
pub trait ValidatorProvider {
    /// The rules, in declaration order.
    fn rules(&self) -> Vec<ValidateRule>;
}

/// Companion supplying the component's asset declarations.
pub trait AssetProvider {
    /// The script declaration, if any.
    fn script(&self) -> Option<AssetDef> {
        None
    }

    /// The style declaration, if any.
    fn style(&self) -> Option<AssetDef> {
        None
    }
}

/// Host collaborator resolving companion type identifiers to instances.
///
/// Each accessor returns `None` when the type does not exist or does not
/// satisfy the capability for that role — discovery records that as an
/// absent companion, not an error. Consulted only at discovery time and
/// when seeding rule sets.
pub trait CompanionSource {
    /// Resolves a normalizer companion.
    fn normalizer(&self, type_id: &str) -> Option<Rc<dyn Normalizer>>;
    /// Resolves a builder companion.
    fn builder(&self, type_id: &str) -> Option<Rc<dyn Builder>>;
    /// Resolves a sanitizer companion.
    fn sanitizer(&self, type_id: &str) -> Option<Rc<dyn SanitizerProvider>>;
    /// Resolves a validator companion.
    fn validator(&self, type_id: &str) -> Option<Rc<dyn ValidatorProvider>>;
    /// Resolves an assets companion.
    fn assets(&self, type_id: &str) -> Option<Rc<dyn AssetProvider>>;
}

/// Runs companion discovery for one alias.
///
/// Probes every companion kind's candidate identifier against the source
/// and records whichever resolve. Defaults are captured from the resolved
/// companions: rule names from the sanitizer/validator providers, context
/// from the normalizer.
pub fn discover_metadata(
    alias: &str,
    namespace: &str,
    source: &dyn CompanionSource,
) -> ComponentMetadata {
    let candidate = |kind| companion_candidate(alias, namespace, kind);

    let normalizer_id = candidate(CompanionKind::Normalizer);
    let builder_id = candidate(CompanionKind::Builder);
    let validator_id = candidate(CompanionKind::Validator);
    let sanitizer_id = candidate(CompanionKind::Sanitizer);
    let assets_id = candidate(CompanionKind::Assets);

    let normalizer = source.normalizer(&normalizer_id);
    let sanitizer = source.sanitizer(&sanitizer_id);
    let validator = source.validator(&validator_id);

    let defaults = ComponentDefaults {
        sanitize: sanitizer
            .as_ref()
            .map(|p| p.rules().iter().map(|r| r.name().to_string()).collect())
            .unwrap_or_default(),
        validate: validator
            .as_ref()
            .map(|p| p.rules().iter().map(|r| r.name().to_string()).collect())
            .unwrap_or_default(),
        context: normalizer
            .as_ref()
            .map(|n| n.default_context())
            .unwrap_or_default(),
    };

    let meta = ComponentMetadata {
        normalizer_ref: normalizer.map(|_| normalizer_id),
        builder_ref: source.builder(&builder_id).map(|_| builder_id),
        validator_ref: validator.map(|_| validator_id),
        sanitizer_ref: sanitizer.map(|_| sanitizer_id),
        assets_ref: source.assets(&assets_id).map(|_| assets_id),
        defaults,
    };

    log::debug!(
        "discovered \"{alias}\": normalizer={} builder={} validator={} sanitizer={} assets={}",
        meta.normalizer_ref.is_some(),
        meta.builder_ref.is_some(),
        meta.validator_ref.is_some(),
        meta.sanitizer_ref.is_some(),
        meta.assets_ref.is_some(),
    );

    meta
}

/// The latest file-modification time under `dir`, recursively.
///
/// Used for mtime-based cache invalidation: when the maximum observed mtime
/// advances since the last check, cached discovery results are stale and
/// re-discovery is forced. Unreadable entries are skipped.
pub fn max_mtime(dir: &Path) -> Option<SystemTime> {
    let mut latest: Option<SystemTime> = None;
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        let modified = if path.is_dir() {
            max_mtime(&path)
        } else {
            entry.metadata().ok().and_then(|m| m.modified().ok())
        };
        if let Some(m) = modified {
            if latest.map_or(true, |l| m > l) {
                latest = Some(m);
            }
        }
    }
    latest
}
