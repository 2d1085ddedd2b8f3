//! Cross-render asset aggregation.
//!
//! Renders within one logical session funnel their script/style
//! declarations here. Assets are keyed by handle; re-ingesting a handle
//! replaces the earlier definition (last write wins). `requires_media`
//! accumulates as a logical OR and never resets within a session.
//!
//! Downstream registration is usage-driven: only the distinct aliases
//! actually rendered in the session are reported, never "everything the
//! registry knows".

use std::collections::{BTreeSet, HashMap};

use crate::component::{AssetDef, RenderResult};

/// Session-scoped collector for script/style declarations.
#[derive(Debug, Clone, Default)]
pub struct AssetAggregator {
    scripts: HashMap<String, AssetDef>,
    styles: HashMap<String, AssetDef>,
    requires_media: bool,
    rendered: BTreeSet<String>,
}

impl AssetAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one render's asset declarations into the session.
    pub fn ingest(&mut self, alias: &str, result: &RenderResult) {
        self.rendered.insert(alias.to_string());
        if let Some(script) = &result.script {
            self.scripts.insert(script.handle.clone(), script.clone());
        }
        if let Some(style) = &result.style {
            self.styles.insert(style.handle.clone(), style.clone());
        }
        self.requires_media |= result.requires_media;
    }

    /// Deduplicated script declarations by handle.
    pub fn scripts(&self) -> &HashMap<String, AssetDef> {
        &self.scripts
    }

    /// Deduplicated style declarations by handle.
    pub fn styles(&self) -> &HashMap<String, AssetDef> {
        &self.styles
    }

    /// True when any ingested render required the host's media machinery.
    pub fn requires_media(&self) -> bool {
        self.requires_media
    }

    /// True when at least one script or style was collected.
    pub fn has_assets(&self) -> bool {
        !self.scripts.is_empty() || !self.styles.is_empty()
    }

    /// The distinct aliases rendered this session, in stable order.
    pub fn rendered_aliases(&self) -> impl Iterator<Item = &str> {
        self.rendered.iter().map(|s| s.as_str())
    }
}
