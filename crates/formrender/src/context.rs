//! Render context passed to component factories.
//!
//! A [`RenderContext`] carries everything one render call needs: the
//! component's configuration data, the submitted field values, the caller's
//! per-field schema entries, and an optional description hook invoked for
//! debug traces right before the factory runs.
//!
//! The context is scoped to one render call within one session. It is
//! cloneable (rules and hooks are `Rc`-backed) but never shared across
//! concurrent executions.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::pipeline::SchemaEntry;

/// Hook producing a human-readable description of a render call.
///
/// Invoked synchronously just before the factory runs, only to enrich the
/// debug trace; it never affects control flow.
pub type ContextCallback = Rc<dyn Fn(&RenderContext) -> String>;

/// Everything one component render call needs.
#[derive(Clone, Default)]
pub struct RenderContext {
    /// Component configuration and display data.
    pub data: Map<String, Value>,
    /// Submitted field values, keyed by field id. The registry writes the
    /// sanitized values back here before the normalizer renders.
    pub submitted: Map<String, Value>,
    /// Caller-supplied schema entries per field id. Ordered so the pipeline
    /// processes fields deterministically.
    pub schema: BTreeMap<String, SchemaEntry>,
    /// Optional description hook for debug traces.
    pub describe: Option<ContextCallback>,
}

impl RenderContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one configuration value.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Sets one submitted field value.
    pub fn with_submitted(mut self, field_id: impl Into<String>, value: Value) -> Self {
        self.submitted.insert(field_id.into(), value);
        self
    }

    /// Adds a schema entry for a field.
    pub fn with_schema(mut self, field_id: impl Into<String>, entry: SchemaEntry) -> Self {
        self.schema.insert(field_id.into(), entry);
        self
    }

    /// Installs the description hook.
    pub fn with_describe<F>(mut self, describe: F) -> Self
    where
        F: Fn(&RenderContext) -> String + 'static,
    {
        self.describe = Some(Rc::new(describe));
        self
    }

    /// The variable portion of a rendered-output cache key: the serialized
    /// data and submitted values.
    ///
    /// Serialization preserves insertion order, so a context that "looks the
    /// same twice" produces the same key material. Schema entries hold
    /// callables and are deliberately excluded.
    pub fn cache_key_material(&self) -> String {
        serde_json::json!({
            "data": self.data,
            "submitted": self.submitted,
        })
        .to_string()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("data", &self.data)
            .field("submitted", &self.submitted)
            .field("schema_fields", &self.schema.keys().collect::<Vec<_>>())
            .field("has_describe", &self.describe.is_some())
            .finish()
    }
}
