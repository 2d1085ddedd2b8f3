//! The component registry.
//!
//! The registry owns the alias → factory and alias → metadata maps for one
//! session. Discovery is lazy: an alias is resolved to its companions on
//! first render (or eagerly via [`ComponentRegistry::warm_cache`]), with
//! results memoized through the cache service when caching is enabled.
//!
//! # Factory Shapes
//!
//! - A component with a normalizer companion gets a wrapped factory: each
//!   render normalizes the context, runs the validation pipeline over the
//!   submitted values (collecting warnings), and then renders through the
//!   normalizer.
//! - A component with only a builder gets a raw factory whose payload is
//!   adapted into a [`RenderResult`] at the boundary.
//! - Closures registered directly via [`ComponentRegistry::register`] are
//!   treated like raw factories.
//!
//! # Lifecycle
//!
//! All memoization lives on the instance — there are no ambient singletons.
//! [`ComponentRegistry::clear_caches`] drops every memoized map and clears
//! both cache namespaces; [`ComponentRegistry::warm_cache`] discovers every
//! known alias up front.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use formrender_cache::{CachePrefix, CacheService};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::discovery::{discover_metadata, max_mtime, Builder, CompanionSource, Normalizer};
use crate::component::{adapt_payload, validate_alias, ComponentMetadata, RenderPayload, Rendered};
use crate::context::RenderContext;
use crate::error::{FormError, Result};
use crate::pipeline::{
    merge_rule_sets, normalize_schema_entry, sanitize_and_validate, PipelineReport,
    ValidationRuleSet,
};

/// A factory closure registered directly, without companion discovery.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> anyhow::Result<RenderPayload>>;

/// An external component registered at runtime: an explicit namespace
/// instead of the registry's built-in base namespace.
#[derive(Debug, Clone)]
pub struct ExternalComponent {
    /// Namespace the companion candidates are derived under.
    pub namespace: String,
}

impl ExternalComponent {
    /// Creates an external registration for the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

/// Cache envelope for discovered metadata: the record plus the maximum
/// source mtime observed when it was written.
///
/// The mtime rides in the shared cache so that an instance constructed
/// *after* a source edit can still tell the entry is stale; a per-instance
/// watermark alone only sees edits made during its own lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiscoveryRecord {
    meta: ComponentMetadata,
    /// Seconds since the Unix epoch, or `None` when the writing instance
    /// watched no source directory.
    #[serde(default)]
    source_mtime: Option<u64>,
}

fn mtime_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A cached record is current unless a watched source file is newer than
/// the record. Records written without mtime tracking count as stale when
/// a source directory is watched.
fn record_is_current(record: &DiscoveryRecord, current: Option<SystemTime>) -> bool {
    match current {
        Some(now) => record
            .source_mtime
            .map_or(false, |written| mtime_secs(now) <= written),
        None => true,
    }
}

/// How an alias renders.
#[derive(Clone)]
enum Factory {
    /// Directly registered closure.
    Func(RenderFn),
    /// Raw builder companion; payload adapted at the boundary.
    Raw(Rc<dyn Builder>),
    /// Normalizer companion routed through the validation pipeline.
    Normalized(Rc<dyn Normalizer>),
}

/// Alias → factory and alias → metadata maps with lazy, cached discovery.
pub struct ComponentRegistry {
    /// Base namespace for built-in aliases.
    namespace: String,
    source: Rc<dyn CompanionSource>,
    cache: Option<CacheService>,
    /// Live development mode: bypass caching entirely so edited companions
    /// take effect immediately.
    live: bool,

    builtins: HashSet<String>,
    external: HashMap<String, ExternalComponent>,
    discovered_external: HashSet<String>,

    metadata: HashMap<String, ComponentMetadata>,
    factories: HashMap<String, Factory>,
    /// Memoized component-bucket rule sets, seeded from metadata defaults.
    rule_sets: HashMap<String, ValidationRuleSet>,

    /// Component source directory for mtime-based invalidation.
    source_dir: Option<PathBuf>,
    last_mtime: Option<SystemTime>,
}

impl ComponentRegistry {
    /// Creates a registry resolving built-in aliases under `namespace`.
    pub fn new(namespace: impl Into<String>, source: Rc<dyn CompanionSource>) -> Self {
        Self {
            namespace: namespace.into(),
            source,
            cache: None,
            live: false,
            builtins: HashSet::new(),
            external: HashMap::new(),
            discovered_external: HashSet::new(),
            metadata: HashMap::new(),
            factories: HashMap::new(),
            rule_sets: HashMap::new(),
            source_dir: None,
            last_mtime: None,
        }
    }

    /// Attaches the cache service used for metadata and rendered output.
    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Declares the built-in aliases this registry can discover.
    ///
    /// # Errors
    ///
    /// Rejects any alias failing the key format.
    pub fn with_builtins<I, S>(mut self, aliases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for alias in aliases {
            let alias = alias.into();
            validate_alias(&alias)?;
            self.builtins.insert(alias);
        }
        Ok(self)
    }

    /// Enables live development mode: caching is bypassed entirely.
    pub fn live_development(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Watches a component source directory; when the maximum observed
    /// file-modification time advances, discovery is forced even if a
    /// cache entry exists.
    ///
    /// Cached metadata records carry the mtime they were written under, so
    /// an edit is detected even when it happened before this instance was
    /// constructed.
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.last_mtime = max_mtime(&dir);
        self.source_dir = Some(dir);
        self
    }

    /// The cache, unless disabled or in live development mode.
    fn active_cache(&self) -> Option<&CacheService> {
        if self.live {
            return None;
        }
        self.cache.as_ref().filter(|c| c.is_enabled())
    }

    /// True when the alias is known: a live factory, an external
    /// registration, or a declared built-in.
    pub fn has(&self, alias: &str) -> bool {
        self.factories.contains_key(alias)
            || self.external.contains_key(alias)
            || self.builtins.contains(alias)
    }

    /// The discovered metadata for an alias, if any.
    pub fn metadata(&self, alias: &str) -> Option<&ComponentMetadata> {
        self.metadata.get(alias)
    }

    /// Registers a factory closure for an alias.
    pub fn register(&mut self, alias: &str, factory: RenderFn) -> Result<()> {
        validate_alias(alias)?;
        self.factories.insert(alias.to_string(), Factory::Func(factory));
        self.rule_sets.remove(alias);
        Ok(())
    }

    /// Merges a builder reference into the alias's metadata, creating an
    /// empty record if absent, and rebuilds the factory.
    pub fn register_builder(&mut self, alias: &str, type_id: impl Into<String>) -> Result<()> {
        validate_alias(alias)?;
        self.metadata.entry(alias.to_string()).or_default().builder_ref = Some(type_id.into());
        self.rebuild_factory(alias);
        Ok(())
    }

    /// Merges an assets reference into the alias's metadata, creating an
    /// empty record if absent.
    pub fn register_assets(&mut self, alias: &str, type_id: impl Into<String>) -> Result<()> {
        validate_alias(alias)?;
        self.metadata.entry(alias.to_string()).or_default().assets_ref = Some(type_id.into());
        self.rebuild_factory(alias);
        Ok(())
    }

    /// Registers an external component for later discovery.
    ///
    /// The alias joins the late-binding source; [`Self::sync_external`] or
    /// the next render wires it into the live maps.
    pub fn register_external(&mut self, alias: &str, external: ExternalComponent) -> Result<()> {
        validate_alias(alias)?;
        self.external.insert(alias.to_string(), external);
        Ok(())
    }

    /// Discovers (or re-discovers) companion metadata for one alias and
    /// installs the resulting factory. Idempotent: repeated calls yield the
    /// same metadata and never duplicate registry entries.
    ///
    /// With `force`, any cached metadata is ignored. Force is also implied
    /// when the watched source directory's mtime has advanced.
    pub fn discover_alias(&mut self, alias: &str, force: bool) -> Result<ComponentMetadata> {
        validate_alias(alias)?;

        let namespace = if let Some(ext) = self.external.get(alias) {
            ext.namespace.clone()
        } else if self.builtins.contains(alias) {
            self.namespace.clone()
        } else {
            return Err(FormError::UnknownComponent(alias.to_string()));
        };

        let current = self.current_source_mtime();
        let force = force || self.watermark_advanced(current);

        if !force {
            if let Some(cache) = self.active_cache() {
                if let Some(raw) = cache.get(alias, CachePrefix::ComponentMetadata) {
                    if let Ok(record) = serde_json::from_value::<DiscoveryRecord>(raw) {
                        if record_is_current(&record, current) {
                            self.install(alias, record.meta.clone());
                            return Ok(record.meta);
                        }
                        log::debug!(
                            "cached metadata for \"{alias}\" predates a source edit; re-discovering"
                        );
                    }
                }
            }
        }

        let meta = discover_metadata(alias, &namespace, self.source.as_ref());
        if let Some(cache) = self.active_cache() {
            let record = DiscoveryRecord {
                meta: meta.clone(),
                source_mtime: current.map(mtime_secs),
            };
            if let Ok(payload) = serde_json::to_value(&record) {
                cache.set(alias, payload, None, CachePrefix::ComponentMetadata);
            }
        }
        self.install(alias, meta.clone());
        Ok(meta)
    }

    /// Detects aliases added to the external source since the last sync and
    /// discovers them without a full re-initialization.
    ///
    /// Diffing set sizes is the cheap guard before the more expensive set
    /// difference. Any new discovery invalidates the memoized rule-set maps
    /// so the new aliases participate.
    pub fn sync_external(&mut self) -> Result<()> {
        if self.external.len() == self.discovered_external.len() {
            return Ok(());
        }

        let pending: Vec<String> = self
            .external
            .keys()
            .filter(|alias| !self.discovered_external.contains(*alias))
            .cloned()
            .collect();

        log::debug!("syncing {} late-registered external aliases", pending.len());
        for alias in pending {
            self.discover_alias(&alias, false)?;
        }
        self.rule_sets.clear();
        Ok(())
    }

    /// Renders one component.
    ///
    /// Undiscovered known aliases are discovered on the spot. Validation
    /// failures never fail the render; they surface as warnings on the
    /// returned [`Rendered`]. Configuration errors fail fast.
    pub fn render(&mut self, alias: &str, ctx: RenderContext) -> Result<Rendered> {
        validate_alias(alias)?;

        // A source edit invalidates installed factories too, not just the
        // pending discoveries.
        let current = self.current_source_mtime();
        let stale = self.watermark_advanced(current);
        if (stale || !self.factories.contains_key(alias))
            && (self.external.contains_key(alias) || self.builtins.contains(alias))
        {
            self.discover_alias(alias, stale)?;
        }

        let factory = self
            .factories
            .get(alias)
            .cloned()
            .ok_or_else(|| FormError::UnknownComponent(alias.to_string()))?;

        if let Some(describe) = &ctx.describe {
            log::debug!("render \"{alias}\": {}", describe(&ctx));
        }

        match factory {
            Factory::Func(f) => Ok(Rendered::clean(adapt_payload(alias, f(&ctx)?)?)),
            Factory::Raw(builder) => {
                Ok(Rendered::clean(adapt_payload(alias, builder.build(&ctx)?)?))
            }
            Factory::Normalized(normalizer) => self.render_normalized(alias, normalizer, ctx),
        }
    }

    /// Renders with rendered-output memoization.
    ///
    /// The cache key is the alias plus the serialized context; identical
    /// contexts hit the cache, anything else falls through to [`Self::render`].
    pub fn render_cached(&mut self, alias: &str, ctx: RenderContext) -> Result<Rendered> {
        validate_alias(alias)?;
        let natural_key = format!("{alias}:{}", ctx.cache_key_material());

        if let Some(cache) = self.active_cache() {
            if let Some(raw) = cache.get(&natural_key, CachePrefix::RenderedOutput) {
                if let Ok(rendered) = serde_json::from_value::<Rendered>(raw) {
                    return Ok(rendered);
                }
            }
        }

        let rendered = self.render(alias, ctx)?;
        if let Some(cache) = self.active_cache() {
            if let Ok(payload) = serde_json::to_value(&rendered) {
                cache.set(&natural_key, payload, None, CachePrefix::RenderedOutput);
            }
        }
        Ok(rendered)
    }

    /// Discovers every declared built-in and registered external alias.
    pub fn warm_cache(&mut self) -> Result<()> {
        let aliases: Vec<String> = self
            .builtins
            .iter()
            .chain(self.external.keys())
            .cloned()
            .collect();
        for alias in aliases {
            self.discover_alias(&alias, false)?;
        }
        Ok(())
    }

    /// Drops every memoized map and clears both cache namespaces.
    pub fn clear_caches(&mut self) {
        self.rule_sets.clear();
        if let Some(cache) = &self.cache {
            cache.clear_all(CachePrefix::ComponentMetadata);
            cache.clear_all(CachePrefix::RenderedOutput);
        }
    }

    /// Installs freshly discovered metadata: wholesale replacement, factory
    /// rebuild, memo invalidation.
    fn install(&mut self, alias: &str, meta: ComponentMetadata) {
        self.metadata.insert(alias.to_string(), meta);
        self.rebuild_factory(alias);
        if self.external.contains_key(alias) {
            self.discovered_external.insert(alias.to_string());
        }
    }

    /// Rebuilds the factory for an alias from its metadata. A normalizer
    /// reference wins over a builder reference; with neither resolvable,
    /// any directly registered closure stays in place.
    fn rebuild_factory(&mut self, alias: &str) {
        self.rule_sets.remove(alias);
        let Some(meta) = self.metadata.get(alias) else {
            return;
        };

        if let Some(id) = &meta.normalizer_ref {
            if let Some(normalizer) = self.source.normalizer(id) {
                self.factories
                    .insert(alias.to_string(), Factory::Normalized(normalizer));
                return;
            }
        }
        if let Some(id) = &meta.builder_ref {
            if let Some(builder) = self.source.builder(id) {
                self.factories
                    .insert(alias.to_string(), Factory::Raw(builder));
            }
        }
    }

    /// The maximum mtime under the watched source directory, if any.
    fn current_source_mtime(&self) -> Option<SystemTime> {
        self.source_dir.as_deref().and_then(max_mtime)
    }

    /// True when `current` is newer than the last observed mtime. Advances
    /// the watermark as a side effect.
    fn watermark_advanced(&mut self, current: Option<SystemTime>) -> bool {
        let Some(dir) = &self.source_dir else {
            return false;
        };
        if current > self.last_mtime {
            log::debug!(
                "source mtime advanced under {}; forcing re-discovery",
                dir.display()
            );
            self.last_mtime = current;
            return true;
        }
        false
    }

    /// The component-bucket rule set for an alias, seeded from its
    /// discovered defaults and memoized until invalidated.
    fn seeded_rules(&mut self, alias: &str) -> ValidationRuleSet {
        if let Some(cached) = self.rule_sets.get(alias) {
            return cached.clone();
        }

        let Some(meta) = self.metadata.get(alias).cloned() else {
            return ValidationRuleSet::default();
        };

        let mut set = ValidationRuleSet::default();
        if let Some(id) = &meta.sanitizer_ref {
            if let Some(provider) = self.source.sanitizer(id) {
                let mut rules = provider.rules();
                for name in &meta.defaults.sanitize {
                    if let Some(pos) = rules.iter().position(|r| r.name() == name.as_str()) {
                        set.sanitize.component.push(rules.remove(pos));
                    }
                }
            }
        }
        if let Some(id) = &meta.validator_ref {
            if let Some(provider) = self.source.validator(id) {
                let mut rules = provider.rules();
                for name in &meta.defaults.validate {
                    if let Some(pos) = rules.iter().position(|r| r.name() == name.as_str()) {
                        set.validate.component.push(rules.remove(pos));
                    }
                }
            }
        }
        set.context = meta.defaults.context.clone();

        self.rule_sets.insert(alias.to_string(), set.clone());
        set
    }

    /// The normalized render path: normalize context, run the pipeline per
    /// schema field, write sanitized values back, render.
    fn render_normalized(
        &mut self,
        alias: &str,
        normalizer: Rc<dyn Normalizer>,
        mut ctx: RenderContext,
    ) -> Result<Rendered> {
        normalizer.normalize(&mut ctx);

        let seed = self.seeded_rules(alias);
        let mut report = PipelineReport::default();
        let schema = std::mem::take(&mut ctx.schema);

        for (field_id, entry) in schema {
            let incoming = normalize_schema_entry(entry, &field_id);
            let rules = merge_rule_sets(seed.clone(), incoming, &field_id)?;
            let value = ctx
                .submitted
                .get(&field_id)
                .cloned()
                .or_else(|| rules.default.clone())
                .unwrap_or(Value::Null);
            let sanitized = sanitize_and_validate(&field_id, value, &rules, &mut report);
            ctx.submitted.insert(field_id, sanitized);
        }

        let result = normalizer.render(&ctx).map_err(FormError::from)?;
        Ok(Rendered {
            result,
            warnings: report.warnings,
            notices: report.notices,
        })
    }
}
