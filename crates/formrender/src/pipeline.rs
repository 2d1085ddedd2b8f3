//! The sanitize/validate pipeline.
//!
//! Submitted values pass through two ordered phases: sanitizers transform
//! the value, then validators judge the final sanitized value. Each phase
//! holds two rule buckets — `component` (the component's own intrinsic
//! rules) and `schema` (caller-supplied rules) — and the execution order is
//! fully deterministic: within each phase, every component rule runs before
//! every schema rule, each bucket in declaration order.
//!
//! Validation failures are never exceptions. A validator that returns
//! `false` or emits a warning records that warning against the field id on
//! the [`PipelineReport`], and execution continues through the remaining
//! validators. The pipeline's return value is always the fully sanitized
//! value.
//!
//! # Rule Shapes
//!
//! Callers can express per-field rules two ways:
//!
//! - A plain list of rules ([`SchemaEntry::Plain`]) — normalized so the
//!   rules land entirely in the schema bucket.
//! - A fully bucketed rule set ([`SchemaEntry::Bucketed`]) — passed through
//!   as-is.
//!
//! Either way, [`normalize_schema_entry`] produces one canonical
//! [`ValidationRuleSet`] shape before merging.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::{FormError, Result};

/// A named sanitize rule.
///
/// The closure receives the prior stage's output and a notice sink for
/// non-fatal transformation notices, and returns the next value.
#[derive(Clone)]
pub struct SanitizeRule {
    name: String,
    apply: Rc<dyn Fn(&Value, &mut dyn FnMut(&str)) -> Value>,
}

impl SanitizeRule {
    /// Creates a named sanitize rule.
    pub fn new<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: Fn(&Value, &mut dyn FnMut(&str)) -> Value + 'static,
    {
        Self {
            name: name.into(),
            apply: Rc::new(apply),
        }
    }

    /// The rule's name, used in debug traces and default lists.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SanitizeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizeRule").field("name", &self.name).finish()
    }
}

/// A named validate rule.
///
/// The closure receives the final sanitized value and a warning sink.
/// Returning `false` without emitting a message still records a generic
/// warning for the rule.
#[derive(Clone)]
pub struct ValidateRule {
    name: String,
    check: Rc<dyn Fn(&Value, &mut dyn FnMut(&str)) -> bool>,
}

impl ValidateRule {
    /// Creates a named validate rule.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &mut dyn FnMut(&str)) -> bool + 'static,
    {
        Self {
            name: name.into(),
            check: Rc::new(check),
        }
    }

    /// The rule's name, used in debug traces and default lists.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ValidateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidateRule").field("name", &self.name).finish()
    }
}

/// The two ordered rule buckets of one pipeline phase.
#[derive(Debug, Clone)]
pub struct RuleBuckets<T> {
    /// Component-intrinsic rules, seeded from discovered defaults.
    pub component: Vec<T>,
    /// Caller-supplied rules from the field schema.
    pub schema: Vec<T>,
}

// Manual impl: the derived one would needlessly bound `T: Default`.
impl<T> Default for RuleBuckets<T> {
    fn default() -> Self {
        Self {
            component: Vec::new(),
            schema: Vec::new(),
        }
    }
}

impl<T> RuleBuckets<T> {
    /// True when both buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.component.is_empty() && self.schema.is_empty()
    }
}

/// The complete per-field rule set after normalization and merging.
#[derive(Debug, Clone, Default)]
pub struct ValidationRuleSet {
    /// Sanitize-phase buckets.
    pub sanitize: RuleBuckets<SanitizeRule>,
    /// Validate-phase buckets.
    pub validate: RuleBuckets<ValidateRule>,
    /// Default value used when no value was submitted for the field.
    pub default: Option<Value>,
    /// Arbitrary per-field context, shallow-merged with schema precedence.
    pub context: Map<String, Value>,
    /// When set, the merged set must contain at least one validator.
    pub requires_validation: bool,
}

/// A caller-supplied schema entry for one field, before normalization.
#[derive(Clone, Default)]
pub struct SchemaEntry {
    /// Sanitize rules, destined for the schema bucket.
    pub sanitize: Vec<SanitizeRule>,
    /// Validate rules, destined for the schema bucket.
    pub validate: Vec<ValidateRule>,
    /// Default value for the field.
    pub default: Option<Value>,
    /// Per-field context.
    pub context: Map<String, Value>,
    /// Marks the field as requiring at least one validator after merging.
    pub requires_validation: bool,
    /// Pre-bucketed rule set; when present the plain fields above are
    /// ignored and this is passed through as-is.
    pub bucketed: Option<Box<ValidationRuleSet>>,
}

impl SchemaEntry {
    /// An entry holding plain (unbucketed) rules.
    pub fn plain(sanitize: Vec<SanitizeRule>, validate: Vec<ValidateRule>) -> Self {
        Self {
            sanitize,
            validate,
            ..Self::default()
        }
    }

    /// An entry passing a pre-bucketed rule set through untouched.
    pub fn bucketed(rules: ValidationRuleSet) -> Self {
        Self {
            bucketed: Some(Box::new(rules)),
            ..Self::default()
        }
    }

    /// Marks the field as requiring validation.
    pub fn required(mut self) -> Self {
        self.requires_validation = true;
        self
    }

    /// Sets the default value used when nothing was submitted.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

impl fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("sanitize", &self.sanitize.len())
            .field("validate", &self.validate.len())
            .field("requires_validation", &self.requires_validation)
            .field("bucketed", &self.bucketed.is_some())
            .finish()
    }
}

/// Warnings and notices accumulated across one pipeline run, keyed by
/// field id. These are reported back to the caller for display; they never
/// halt execution.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Non-fatal notices emitted by sanitizers.
    pub notices: HashMap<String, Vec<String>>,
    /// Validation warnings emitted by (or recorded for) validators.
    pub warnings: HashMap<String, Vec<String>>,
}

impl PipelineReport {
    /// Records a sanitizer notice against a field.
    pub fn notice(&mut self, field_id: &str, message: impl Into<String>) {
        self.notices
            .entry(field_id.to_string())
            .or_default()
            .push(message.into());
    }

    /// Records a validation warning against a field.
    pub fn warn(&mut self, field_id: &str, message: impl Into<String>) {
        self.warnings
            .entry(field_id.to_string())
            .or_default()
            .push(message.into());
    }

    /// True when any field has at least one warning.
    pub fn has_warnings(&self) -> bool {
        self.warnings.values().any(|w| !w.is_empty())
    }
}

/// Normalizes a caller-supplied schema entry into the canonical bucketed
/// shape.
///
/// A plain entry's rules land entirely in the schema bucket, leaving the
/// component bucket empty; a pre-bucketed entry passes through as-is. This
/// produces one canonical shape regardless of how the caller expressed the
/// rules.
pub fn normalize_schema_entry(entry: SchemaEntry, field_id: &str) -> ValidationRuleSet {
    if let Some(bucketed) = entry.bucketed {
        log::trace!("schema entry for \"{field_id}\" is already bucketed");
        return *bucketed;
    }

    log::trace!(
        "normalizing plain schema entry for \"{field_id}\" ({} sanitize, {} validate)",
        entry.sanitize.len(),
        entry.validate.len()
    );
    ValidationRuleSet {
        sanitize: RuleBuckets {
            component: Vec::new(),
            schema: entry.sanitize,
        },
        validate: RuleBuckets {
            component: Vec::new(),
            schema: entry.validate,
        },
        default: entry.default,
        context: entry.context,
        requires_validation: entry.requires_validation,
    }
}

/// Merges a component's own rule set with an incoming (caller) rule set.
///
/// Per phase, buckets are concatenated — never replaced — preserving
/// relative order within each bucket. Context maps are shallow-merged with
/// incoming (schema) keys winning on collision. The default value follows
/// the same precedence.
///
/// # Errors
///
/// Returns [`FormError::NoValidators`] if the merged set is marked as
/// requiring validation but holds zero validators in both buckets. This is
/// a configuration error and fails at registration time, not at submit.
pub fn merge_rule_sets(
    existing: ValidationRuleSet,
    incoming: ValidationRuleSet,
    field_id: &str,
) -> Result<ValidationRuleSet> {
    let mut merged = ValidationRuleSet {
        sanitize: RuleBuckets {
            component: existing.sanitize.component,
            schema: existing.sanitize.schema,
        },
        validate: RuleBuckets {
            component: existing.validate.component,
            schema: existing.validate.schema,
        },
        default: incoming.default.or(existing.default),
        context: existing.context,
        requires_validation: existing.requires_validation || incoming.requires_validation,
    };

    merged.sanitize.component.extend(incoming.sanitize.component);
    merged.sanitize.schema.extend(incoming.sanitize.schema);
    merged.validate.component.extend(incoming.validate.component);
    merged.validate.schema.extend(incoming.validate.schema);

    // Shallow merge, schema keys take precedence.
    for (key, value) in incoming.context {
        merged.context.insert(key, value);
    }

    if merged.requires_validation && merged.validate.is_empty() {
        return Err(FormError::NoValidators(field_id.to_string()));
    }

    Ok(merged)
}

/// Runs the full sanitize-then-validate pipeline for one field.
///
/// Sanitizers run first (component bucket, then schema bucket, each in
/// declaration order), each receiving the prior stage's output. Validators
/// then run in the same bucket order against the final sanitized value.
/// Nothing short-circuits: every validator runs even after a failure.
///
/// Warnings and notices accumulate on `report` keyed by `field_id`; the
/// return value is the fully sanitized value.
pub fn sanitize_and_validate(
    field_id: &str,
    value: Value,
    rules: &ValidationRuleSet,
    report: &mut PipelineReport,
) -> Value {
    let mut current = value;

    for (bucket, list) in [
        ("component", &rules.sanitize.component),
        ("schema", &rules.sanitize.schema),
    ] {
        for rule in list {
            log::trace!("sanitize [{bucket}] \"{}\" on \"{field_id}\"", rule.name());
            let mut notices = Vec::new();
            current = (rule.apply)(&current, &mut |msg| notices.push(msg.to_string()));
            for msg in notices {
                report.notice(field_id, msg);
            }
        }
    }

    for (bucket, list) in [
        ("component", &rules.validate.component),
        ("schema", &rules.validate.schema),
    ] {
        for rule in list {
            log::trace!("validate [{bucket}] \"{}\" on \"{field_id}\"", rule.name());
            let mut emitted = Vec::new();
            let passed = (rule.check)(&current, &mut |msg| emitted.push(msg.to_string()));
            let emitted_any = !emitted.is_empty();
            for msg in emitted {
                report.warn(field_id, msg);
            }
            if !passed && !emitted_any {
                report.warn(field_id, format!("validation rule \"{}\" failed", rule.name()));
            }
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn passthrough(name: &str) -> SanitizeRule {
        SanitizeRule::new(name, |value, _notice| value.clone())
    }

    fn trim_rule() -> SanitizeRule {
        SanitizeRule::new("trim", |value, _notice| match value.as_str() {
            Some(s) => Value::String(s.trim().to_string()),
            None => value.clone(),
        })
    }

    fn always_pass(name: &str) -> ValidateRule {
        ValidateRule::new(name, |_value, _warn| true)
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    #[test]
    fn test_plain_entry_lands_in_schema_bucket() {
        let entry = SchemaEntry::plain(vec![trim_rule()], vec![always_pass("ok")]);
        let rules = normalize_schema_entry(entry, "title");

        assert!(rules.sanitize.component.is_empty());
        assert_eq!(rules.sanitize.schema.len(), 1);
        assert!(rules.validate.component.is_empty());
        assert_eq!(rules.validate.schema.len(), 1);
    }

    #[test]
    fn test_bucketed_entry_passes_through() {
        let mut set = ValidationRuleSet::default();
        set.sanitize.component.push(trim_rule());
        set.requires_validation = false;

        let rules = normalize_schema_entry(SchemaEntry::bucketed(set), "title");
        assert_eq!(rules.sanitize.component.len(), 1);
        assert!(rules.sanitize.schema.is_empty());
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn test_merge_is_concatenation_not_overwrite() {
        let mut existing = ValidationRuleSet::default();
        existing.sanitize.component.push(passthrough("a"));
        existing.sanitize.schema.push(passthrough("b"));

        let mut incoming = ValidationRuleSet::default();
        incoming.sanitize.component.push(passthrough("c"));

        let merged = merge_rule_sets(existing, incoming, "f").unwrap();
        let component: Vec<&str> = merged.sanitize.component.iter().map(|r| r.name()).collect();
        let schema: Vec<&str> = merged.sanitize.schema.iter().map(|r| r.name()).collect();

        assert_eq!(component, vec!["a", "c"]);
        assert_eq!(schema, vec!["b"]);
    }

    #[test]
    fn test_merge_context_schema_wins() {
        let mut existing = ValidationRuleSet::default();
        existing.context.insert("size".into(), serde_json::json!("small"));
        existing.context.insert("kind".into(), serde_json::json!("text"));

        let mut incoming = ValidationRuleSet::default();
        incoming.context.insert("size".into(), serde_json::json!("large"));

        let merged = merge_rule_sets(existing, incoming, "f").unwrap();
        assert_eq!(merged.context["size"], serde_json::json!("large"));
        assert_eq!(merged.context["kind"], serde_json::json!("text"));
    }

    #[test]
    fn test_merge_incoming_default_wins() {
        let mut existing = ValidationRuleSet::default();
        existing.default = Some(serde_json::json!("component default"));

        let mut incoming = ValidationRuleSet::default();
        incoming.default = Some(serde_json::json!("schema default"));

        let merged = merge_rule_sets(existing, incoming, "f").unwrap();
        assert_eq!(merged.default, Some(serde_json::json!("schema default")));
    }

    #[test]
    fn test_required_field_with_zero_validators_errors_at_merge() {
        let existing = ValidationRuleSet::default();
        let mut incoming = ValidationRuleSet::default();
        incoming.requires_validation = true;

        let result = merge_rule_sets(existing, incoming, "email");
        assert!(matches!(result, Err(FormError::NoValidators(ref f)) if f == "email"));
    }

    #[test]
    fn test_required_field_with_validator_merges() {
        let mut existing = ValidationRuleSet::default();
        existing.validate.component.push(always_pass("present"));

        let mut incoming = ValidationRuleSet::default();
        incoming.requires_validation = true;

        assert!(merge_rule_sets(existing, incoming, "email").is_ok());
    }

    // =========================================================================
    // Execution order
    // =========================================================================

    #[test]
    fn test_bucket_order_is_deterministic() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let tracer = |name: &'static str, order: &Rc<RefCell<Vec<&'static str>>>| {
            let order = order.clone();
            SanitizeRule::new(name, move |value, _notice| {
                order.borrow_mut().push(name);
                value.clone()
            })
        };
        let vtracer = |name: &'static str, order: &Rc<RefCell<Vec<&'static str>>>| {
            let order = order.clone();
            ValidateRule::new(name, move |_value, _warn| {
                order.borrow_mut().push(name);
                true
            })
        };

        let mut rules = ValidationRuleSet::default();
        rules.sanitize.component.push(tracer("c1", &order));
        rules.sanitize.component.push(tracer("c2", &order));
        rules.sanitize.schema.push(tracer("s1", &order));
        rules.sanitize.schema.push(tracer("s2", &order));
        rules.validate.component.push(vtracer("vc1", &order));
        rules.validate.component.push(vtracer("vc2", &order));
        rules.validate.schema.push(vtracer("vs1", &order));
        rules.validate.schema.push(vtracer("vs2", &order));

        let mut report = PipelineReport::default();
        for _ in 0..3 {
            order.borrow_mut().clear();
            sanitize_and_validate("f", serde_json::json!("x"), &rules, &mut report);
            assert_eq!(
                *order.borrow(),
                vec!["c1", "c2", "s1", "s2", "vc1", "vc2", "vs1", "vs2"]
            );
        }
    }

    #[test]
    fn test_sanitizers_chain_output() {
        let mut rules = ValidationRuleSet::default();
        rules.sanitize.component.push(trim_rule());
        rules.sanitize.schema.push(SanitizeRule::new("upper", |value, _notice| {
            match value.as_str() {
                Some(s) => Value::String(s.to_uppercase()),
                None => value.clone(),
            }
        }));

        let mut report = PipelineReport::default();
        let out = sanitize_and_validate("f", serde_json::json!("  hi  "), &rules, &mut report);
        assert_eq!(out, serde_json::json!("HI"));
    }

    #[test]
    fn test_validators_do_not_short_circuit() {
        let mut rules = ValidationRuleSet::default();
        rules.validate.schema.push(ValidateRule::new("first", |_value, warn| {
            warn("first failed");
            false
        }));
        rules.validate.schema.push(ValidateRule::new("second", |_value, warn| {
            warn("second failed");
            false
        }));

        let mut report = PipelineReport::default();
        sanitize_and_validate("f", serde_json::json!(1), &rules, &mut report);

        assert_eq!(
            report.warnings["f"],
            vec!["first failed".to_string(), "second failed".to_string()]
        );
    }

    #[test]
    fn test_false_without_message_records_generic_warning() {
        let mut rules = ValidationRuleSet::default();
        rules
            .validate
            .component
            .push(ValidateRule::new("nonempty", |_value, _warn| false));

        let mut report = PipelineReport::default();
        sanitize_and_validate("f", serde_json::json!(""), &rules, &mut report);

        assert_eq!(report.warnings["f"].len(), 1);
        assert!(report.warnings["f"][0].contains("nonempty"));
    }

    #[test]
    fn test_notices_are_not_warnings() {
        let mut rules = ValidationRuleSet::default();
        rules.sanitize.schema.push(SanitizeRule::new("strip-tags", |value, notice| {
            notice("markup removed");
            value.clone()
        }));

        let mut report = PipelineReport::default();
        sanitize_and_validate("f", serde_json::json!("<b>x</b>"), &rules, &mut report);

        assert_eq!(report.notices["f"], vec!["markup removed".to_string()]);
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_validators_see_final_sanitized_value() {
        let seen = Rc::new(RefCell::new(Value::Null));
        let seen_clone = seen.clone();

        let mut rules = ValidationRuleSet::default();
        rules.sanitize.component.push(trim_rule());
        rules.validate.schema.push(ValidateRule::new("capture", move |value, _warn| {
            *seen_clone.borrow_mut() = value.clone();
            true
        }));

        let mut report = PipelineReport::default();
        sanitize_and_validate("f", serde_json::json!("  x  "), &rules, &mut report);
        assert_eq!(*seen.borrow(), serde_json::json!("x"));
    }
}
