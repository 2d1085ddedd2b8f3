//! Two-tier template override resolution.
//!
//! Which concrete wrapper template renders a structural element is decided
//! by walking three layers:
//!
//! 1. Tier 2 — individual per-element overrides, checked from the most
//!    specific element to the least: field → group → section → root. The
//!    first match wins. This path is logged (debug), because an individual
//!    override is an intentional deviation worth observing.
//! 2. Tier 1 — form-wide defaults per template type. The expected,
//!    high-frequency path; deliberately unlogged.
//! 3. The built-in fallback table of canonical template keys. Logged
//!    (debug) — expected when a caller customizes only some template types.
//!
//! Both tiers are plain last-write-wins maps; no history is kept.
//! Resolution always terminates: every known template type has a canonical
//! key and unknown types fall back to one generic key. The only error is an
//! empty template type, which is a caller contract violation.

use std::collections::HashMap;

use crate::error::{FormError, Result};

/// The structural element kinds that can carry individual overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// The form root.
    Root,
    /// A section within the root.
    Section,
    /// A group within a section.
    Group,
    /// A single field.
    Field,
}

impl ElementKind {
    /// Tier-2 lookup order, most specific first.
    pub const PRECEDENCE: [ElementKind; 4] = [
        ElementKind::Field,
        ElementKind::Group,
        ElementKind::Section,
        ElementKind::Root,
    ];

    /// Lowercase name for traces and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Root => "root",
            ElementKind::Section => "section",
            ElementKind::Group => "group",
            ElementKind::Field => "field",
        }
    }
}

/// The element ids in play for one resolution call.
///
/// Any subset may be present; absent ids simply skip their tier-2 layer.
#[derive(Debug, Clone, Default)]
pub struct ResolveScope {
    /// Id of the enclosing root.
    pub root_id: Option<String>,
    /// Id of the enclosing section.
    pub section_id: Option<String>,
    /// Id of the enclosing group.
    pub group_id: Option<String>,
    /// Id of the field being rendered.
    pub field_id: Option<String>,
}

impl ResolveScope {
    /// A scope with only a field id.
    pub fn field(id: impl Into<String>) -> Self {
        Self {
            field_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// A scope with only a section id.
    pub fn section(id: impl Into<String>) -> Self {
        Self {
            section_id: Some(id.into()),
            ..Self::default()
        }
    }

    fn id_for(&self, kind: ElementKind) -> Option<&str> {
        match kind {
            ElementKind::Root => self.root_id.as_deref(),
            ElementKind::Section => self.section_id.as_deref(),
            ElementKind::Group => self.group_id.as_deref(),
            ElementKind::Field => self.field_id.as_deref(),
        }
    }
}

/// Debug snapshot of every override currently set.
#[derive(Debug, Clone)]
pub struct OverridesSnapshot {
    /// Tier-1 form-wide defaults.
    pub form_defaults: HashMap<String, String>,
    /// Tier-2 individual overrides: kind → element id → template type → key.
    pub individual: HashMap<ElementKind, HashMap<String, HashMap<String, String>>>,
}

/// The canonical template key for a known template type, or the generic
/// fallback for anything else.
fn builtin_fallback(template_type: &str) -> &'static str {
    match template_type {
        "root-wrapper" => "wrappers/root",
        "section-wrapper" => "wrappers/section",
        "group-wrapper" => "wrappers/group",
        "field-wrapper" => "wrappers/field",
        _ => "wrappers/element",
    }
}

/// Two-tier template override store and resolver.
#[derive(Debug, Clone, Default)]
pub struct TemplateOverrides {
    form_defaults: HashMap<String, String>,
    individual: HashMap<ElementKind, HashMap<String, HashMap<String, String>>>,
}

impl TemplateOverrides {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the Tier-1 form-wide defaults wholesale.
    pub fn set_form_defaults(&mut self, defaults: HashMap<String, String>) {
        self.form_defaults = defaults;
    }

    /// Shallow-merges a partial map into the Tier-1 defaults. Existing
    /// template types not named in `partial` are left undisturbed.
    pub fn override_form_defaults(&mut self, partial: HashMap<String, String>) {
        for (template_type, key) in partial {
            self.form_defaults.insert(template_type, key);
        }
    }

    /// Sets the Tier-2 overrides for one element instance, replacing any
    /// previous map for that (kind, id) pair.
    pub fn set_overrides(
        &mut self,
        kind: ElementKind,
        element_id: impl Into<String>,
        overrides: HashMap<String, String>,
    ) {
        self.individual
            .entry(kind)
            .or_default()
            .insert(element_id.into(), overrides);
    }

    /// The Tier-2 overrides for one element instance, if any.
    pub fn get_overrides(&self, kind: ElementKind, element_id: &str) -> Option<&HashMap<String, String>> {
        self.individual.get(&kind)?.get(element_id)
    }

    /// Drops every override in both tiers.
    pub fn clear_all_overrides(&mut self) {
        self.form_defaults.clear();
        self.individual.clear();
    }

    /// Debug snapshot of everything currently set.
    pub fn get_all_overrides(&self) -> OverridesSnapshot {
        OverridesSnapshot {
            form_defaults: self.form_defaults.clone(),
            individual: self.individual.clone(),
        }
    }

    /// Resolves which template key renders `template_type` for the given
    /// scope.
    ///
    /// # Errors
    ///
    /// An empty `template_type` is an immediate caller error; everything
    /// else resolves.
    pub fn resolve_template(&self, template_type: &str, scope: &ResolveScope) -> Result<String> {
        if template_type.is_empty() {
            return Err(FormError::EmptyTemplateType);
        }

        // Tier 2: most specific element first, first match wins.
        for kind in ElementKind::PRECEDENCE {
            let Some(id) = scope.id_for(kind) else {
                continue;
            };
            if let Some(key) = self
                .individual
                .get(&kind)
                .and_then(|by_id| by_id.get(id))
                .and_then(|map| map.get(template_type))
            {
                log::debug!(
                    "template \"{template_type}\" resolved to \"{key}\" via {} override \"{id}\"",
                    kind.as_str()
                );
                return Ok(key.clone());
            }
        }

        // Tier 1: the expected path, not logged.
        if let Some(key) = self.form_defaults.get(template_type) {
            return Ok(key.clone());
        }

        let key = builtin_fallback(template_type);
        log::debug!("template \"{template_type}\" fell back to system default \"{key}\"");
        Ok(key.to_string())
    }
}
