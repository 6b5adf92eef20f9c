//! Rule registry and the built-in rule set.
//!
//! Every rule is registered under the single top-level key of a schema
//! fragment. The fragment's value describes the shape of the rule's own
//! argument and is merged into the schema-of-schemas, which is used to
//! check user schemas before they are applied.

pub mod nested;
pub mod normalization;
pub mod policy;
pub mod relations;
pub mod type_check;
pub mod values;

use crate::context::ValidationContext;
use crate::error::{Result, WardenError};
use crate::node::key_text;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// When a rule runs relative to the other rules of the same field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RulePriority {
    /// Runs before anything else. Reserved for pushing scoped policy.
    First,
    /// Rewrites the document before it is validated (e.g. `default`).
    Normalization,
    /// The default for ordinary validation rules.
    Validation,
    /// Type checks run after the other validation rules.
    TypeChecking,
    /// Rewrites that need the value to be accepted first (e.g. `rename`).
    PostNormalization,
    /// Runs after everything else. Reserved for popping scoped policy.
    Last,
}

impl RulePriority {
    pub const ALL: [RulePriority; 6] = [
        RulePriority::First,
        RulePriority::Normalization,
        RulePriority::Validation,
        RulePriority::TypeChecking,
        RulePriority::PostNormalization,
        RulePriority::Last,
    ];
}

impl fmt::Display for RulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePriority::First => write!(f, "first"),
            RulePriority::Normalization => write!(f, "normalization"),
            RulePriority::Validation => write!(f, "validation"),
            RulePriority::TypeChecking => write!(f, "type_checking"),
            RulePriority::PostNormalization => write!(f, "post_normalization"),
            RulePriority::Last => write!(f, "last"),
        }
    }
}

/// Rule behaviour. Document problems are reported through
/// `ValidationContext::raise_error`; an `Err` aborts the whole validation.
pub type RuleFn = dyn Fn(&mut ValidationContext<'_>) -> Result<()> + Send + Sync;

/// A registered rule.
#[derive(Clone)]
pub struct RuleDescriptor {
    pub name: String,
    pub priority: RulePriority,
    /// Shape of the rule's argument, as merged into the schema-of-schemas.
    pub argument_schema: Value,
    behavior: Arc<RuleFn>,
}

impl RuleDescriptor {
    pub fn apply(&self, ctx: &mut ValidationContext<'_>) -> Result<()> {
        (self.behavior)(ctx)
    }
}

impl fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Maps (priority, rule name) to rule behaviour and accumulates the
/// schema-of-schemas.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<(RulePriority, String), RuleDescriptor>,
    schema_of_schemas: Mapping,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in rule.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        policy::register(&mut registry);
        normalization::register(&mut registry);
        values::register(&mut registry);
        relations::register(&mut registry);
        nested::register(&mut registry);
        type_check::register(&mut registry);
        registry
    }

    /// Register a rule from a single-key schema fragment such as
    /// `{oddity: {type: boolean}}`.
    pub fn register_fragment<F>(
        &mut self,
        fragment: &Value,
        behavior: F,
        priority: RulePriority,
    ) -> Result<()>
    where
        F: Fn(&mut ValidationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let entry = match fragment.as_mapping() {
            Some(map) if map.len() == 1 => map.iter().next(),
            _ => None,
        };
        let Some((name, argument_schema)) = entry else {
            return Err(WardenError::Config(format!(
                "Rule fragment must be a mapping with exactly one key, got {}",
                crate::node::display(fragment)
            )));
        };
        self.insert(&key_text(name), argument_schema.clone(), priority, behavior);
        Ok(())
    }

    /// Register a rule by name. Replaces only the (priority, name) slot;
    /// the same name may hold descriptors at several priorities.
    pub fn insert<F>(&mut self, name: &str, argument_schema: Value, priority: RulePriority, behavior: F)
    where
        F: Fn(&mut ValidationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let slot = (priority, name.to_string());
        if self.rules.contains_key(&slot) {
            log::warn!("Rule '{name}' at priority {priority} registered twice; replacing");
        }
        self.schema_of_schemas
            .insert(Value::String(name.to_string()), argument_schema.clone());
        self.rules.insert(
            slot,
            RuleDescriptor {
                name: name.to_string(),
                priority,
                argument_schema,
                behavior: Arc::new(behavior),
            },
        );
    }

    pub fn lookup(&self, priority: RulePriority, name: &str) -> Option<&RuleDescriptor> {
        self.rules.get(&(priority, name.to_string()))
    }

    /// Whether any descriptor is registered under `name`.
    pub fn knows(&self, name: &str) -> bool {
        self.schema_of_schemas.contains_key(name)
    }

    pub fn schema_of_schemas(&self) -> &Mapping {
        &self.schema_of_schemas
    }
}

/// Build an argument schema from `(rule, argument)` pairs.
pub(crate) fn arg_schema(pairs: &[(&str, Value)]) -> Value {
    let mut map = Mapping::new();
    for (key, value) in pairs {
        map.insert(Value::String((*key).to_string()), value.clone());
    }
    Value::Mapping(map)
}

/// `type: name` or `type: [a, b]` for an argument schema.
pub(crate) fn of_type(names: &[&str]) -> (&'static str, Value) {
    let value = match names {
        [single] => Value::String((*single).to_string()),
        many => Value::Sequence(many.iter().map(|n| Value::String((*n).to_string())).collect()),
    };
    ("type", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut sorted = RulePriority::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, RulePriority::ALL.to_vec());
        assert!(RulePriority::Normalization < RulePriority::TypeChecking);
    }

    #[test]
    fn test_builtins_populate_schema_of_schemas() {
        let registry = RuleRegistry::with_builtins();
        for name in [
            "type", "required", "default", "nullable", "allowed", "forbidden", "min", "max",
            "minlength", "maxlength", "empty", "regex", "contains", "dependencies", "excludes",
            "items", "keysrules", "valuesrules", "schema", "rename", "allow_unknown",
            "purge_unknown", "require_all", "meta",
        ] {
            assert!(registry.knows(name), "missing built-in rule {name}");
        }
        assert!(registry.lookup(RulePriority::First, "allow_unknown").is_some());
        assert!(registry.lookup(RulePriority::Last, "allow_unknown").is_some());
        assert!(registry.lookup(RulePriority::Validation, "allow_unknown").is_none());
        assert!(registry.lookup(RulePriority::TypeChecking, "type").is_some());
    }

    #[test]
    fn test_register_fragment_needs_single_key() {
        let mut registry = RuleRegistry::new();
        let fragment: Value = serde_yaml::from_str("a: {}\nb: {}").unwrap();
        let err = registry
            .register_fragment(&fragment, |_| Ok(()), RulePriority::Validation)
            .unwrap_err();
        assert!(matches!(err, WardenError::Config(_)));

        let fragment: Value = serde_yaml::from_str("oddity: {type: boolean}").unwrap();
        registry
            .register_fragment(&fragment, |_| Ok(()), RulePriority::Validation)
            .unwrap();
        assert!(registry.knows("oddity"));
        assert_eq!(
            registry.lookup(RulePriority::Validation, "oddity").unwrap().argument_schema,
            serde_yaml::from_str::<Value>("type: boolean").unwrap()
        );
    }

    #[test]
    fn test_same_name_keeps_other_priorities() {
        let mut registry = RuleRegistry::new();
        registry.insert("flag", Value::Null, RulePriority::First, |_| Ok(()));
        registry.insert("flag", Value::Null, RulePriority::Last, |_| Ok(()));
        registry.insert("flag", Value::Null, RulePriority::First, |_| Ok(()));
        assert!(registry.lookup(RulePriority::First, "flag").is_some());
        assert!(registry.lookup(RulePriority::Last, "flag").is_some());
    }
}
