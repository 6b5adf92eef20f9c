//! The recursive validation engine.
//!
//! A `ValidationContext` lives for one validation pass. It owns a working
//! copy of the document and is handed by `&mut` to every rule, which can
//! inspect and rewrite the current value, raise errors, toggle scoped
//! policy, and recurse into sub-documents.

use crate::bootstrap::SchemaChecker;
use crate::error::{Result, SchemaError, ValidationErrorItem};
use crate::node::{self, key_text, remove_key, scalar_text, set_key, untag};
use crate::rules::{RulePriority, RuleRegistry};
use crate::stack::{NodeStack, PathStep};
use crate::types::{TypeDescriptor, TypeRegistry};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};

/// Validator-wide boolean behaviours that nested schemas can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    AllowUnknown,
    PurgeUnknown,
    RequireAll,
}

/// Starting values for the scoped policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyDefaults {
    pub allow_unknown: bool,
    pub purge_unknown: bool,
    pub require_all: bool,
}

/// One stack per policy; the bottom entry is the validator-level value
/// and is never popped.
#[derive(Debug, Clone)]
struct ScopedPolicies {
    allow_unknown: Vec<bool>,
    purge_unknown: Vec<bool>,
    require_all: Vec<bool>,
}

impl ScopedPolicies {
    fn new(defaults: PolicyDefaults) -> Self {
        ScopedPolicies {
            allow_unknown: vec![defaults.allow_unknown],
            purge_unknown: vec![defaults.purge_unknown],
            require_all: vec![defaults.require_all],
        }
    }

    fn stack(&self, policy: Policy) -> &Vec<bool> {
        match policy {
            Policy::AllowUnknown => &self.allow_unknown,
            Policy::PurgeUnknown => &self.purge_unknown,
            Policy::RequireAll => &self.require_all,
        }
    }

    fn stack_mut(&mut self, policy: Policy) -> &mut Vec<bool> {
        match policy {
            Policy::AllowUnknown => &mut self.allow_unknown,
            Policy::PurgeUnknown => &mut self.purge_unknown,
            Policy::RequireAll => &mut self.require_all,
        }
    }
}

/// How a sub-schema argument is applied: walked as a mapping of fields,
/// or applied as a single rule-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaShape {
    Mapping,
    RuleSet,
}

/// The mapping field currently being validated, and where it should end
/// up if a `rename` rule fires.
#[derive(Debug, Clone)]
struct FieldFrame {
    name: String,
    rename_to: Option<String>,
    /// Document stack depth of the field's own frame.
    depth: usize,
}

pub struct ValidationContext<'v> {
    rules: &'v RuleRegistry,
    types: &'v TypeRegistry,
    schemas: &'v HashMap<String, Value>,
    document: NodeStack,
    schema: NodeStack,
    errors: Vec<ValidationErrorItem>,
    policies: ScopedPolicies,
    fields: Vec<FieldFrame>,
    max_depth: usize,
    depth: usize,
    schema_validation: bool,
    /// Named schemas already checked against the schema-of-schemas.
    checked: HashMap<(String, SchemaShape), Value>,
    regexes: HashMap<String, Regex>,
}

impl<'v> ValidationContext<'v> {
    pub fn new(
        rules: &'v RuleRegistry,
        types: &'v TypeRegistry,
        schemas: &'v HashMap<String, Value>,
        defaults: PolicyDefaults,
        max_depth: usize,
    ) -> Self {
        ValidationContext {
            rules,
            types,
            schemas,
            document: NodeStack::new(),
            schema: NodeStack::new(),
            errors: Vec::new(),
            policies: ScopedPolicies::new(defaults),
            fields: Vec::new(),
            max_depth,
            depth: 0,
            schema_validation: false,
            checked: HashMap::new(),
            regexes: HashMap::new(),
        }
    }

    /// Check named schemas against the schema-of-schemas when they are
    /// first resolved. Off by default.
    pub fn set_schema_validation(&mut self, value: bool) {
        self.schema_validation = value;
    }

    /// Start over on a fresh working copy of `document`.
    pub fn reset(&mut self, document: Option<Value>) {
        self.errors.clear();
        self.fields.clear();
        self.depth = 0;
        self.document.reset(document);
        self.schema = NodeStack::new();
    }

    /// Hand back the normalized document and the collected errors.
    pub fn finish(mut self) -> (Value, Vec<ValidationErrorItem>) {
        let document = self.document.take_root().unwrap_or(Value::Null);
        (document, self.errors)
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationErrorItem] {
        &self.errors
    }

    /// Record an error at the current document path. Validation carries on.
    pub fn raise_error(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationErrorItem {
            path: self.document.string_path(),
            message: message.into(),
        });
    }

    /// Walk a mapping schema over the current document node, which must
    /// be a mapping (an undefined or null node is treated as empty).
    ///
    /// Returns whether no errors have been collected so far.
    pub fn validate_mapping(&mut self, schema: &Value) -> Result<bool> {
        let Value::Mapping(fields) = untag(schema) else {
            self.raise_error(format!(
                "Schema for a dict must be a mapping, got {}",
                node::kind_name(schema)
            ));
            return Ok(self.success());
        };

        match self.document.peek(0).map(untag) {
            None | Some(Value::Null) => self.document.replace_top(Some(Value::Mapping(Mapping::new()))),
            Some(Value::Mapping(_)) => {}
            Some(other) => {
                let kind = node::kind_name(other);
                self.raise_error(format!("Expected a dict, got {kind}"));
                return Ok(self.success());
            }
        }
        if let Some(slot) = self.document.peek_mut(0) {
            if let Some(Value::Tagged(tagged)) = slot {
                let inner = std::mem::replace(&mut tagged.value, Value::Null);
                *slot = Some(inner);
            }
        }

        self.schema.push_node(Some(schema.clone()), None);
        let mut declared: HashSet<String> = HashSet::new();

        for (key, rules) in fields {
            let field = key_text(key);
            // A field already renamed on an earlier pass is validated where
            // it now lives, so neither its default nor the rename clobbers it.
            let source = self.renamed_location(&field, rules).unwrap_or_else(|| field.clone());
            self.document.push_key(&source);
            self.fields.push(FieldFrame {
                name: field.clone(),
                rename_to: None,
                depth: self.document.depth(),
            });

            self.validate_item(rules)?;

            let value = self.document.pop();
            let frame = self.fields.pop();
            let target = frame.and_then(|f| f.rename_to).unwrap_or_else(|| source.clone());
            if let Some(Some(Value::Mapping(parent))) = self.document.peek_mut(0) {
                if target != source {
                    remove_key(parent, &source);
                }
                if let Some(value) = value {
                    set_key(parent, &target, value);
                }
            }
            declared.insert(field);
            declared.insert(source);
            declared.insert(target);
        }

        let purge = self.policy(Policy::PurgeUnknown);
        let allow = self.policy(Policy::AllowUnknown);
        if purge {
            if let Some(Some(Value::Mapping(parent))) = self.document.peek_mut(0) {
                let kept: Mapping = parent
                    .iter()
                    .filter(|(k, _)| declared.contains(&key_text(k)))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                *parent = kept;
            }
        }
        if !allow {
            let unknown: Vec<String> = match self.document.peek(0) {
                Some(Value::Mapping(parent)) => parent
                    .keys()
                    .map(key_text)
                    .filter(|k| !declared.contains(k))
                    .collect(),
                _ => Vec::new(),
            };
            for key in unknown {
                self.document.push_node(None, Some(PathStep::Key(key.clone())));
                self.raise_error(format!("Unknown field '{key}' is not allowed"));
                self.document.pop();
            }
        }

        self.schema.pop();
        Ok(self.success())
    }

    /// Apply a rule-set to the current document node: every rule whose
    /// key appears in `schema`, by ascending priority, and in declaration
    /// order within a priority.
    pub fn validate_item(&mut self, schema: &Value) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SchemaError::RecursionLimit {
                limit: self.max_depth,
                path: self.document.string_path(),
            }
            .into());
        }

        let mut rules = match untag(schema) {
            Value::Mapping(rules) => rules.clone(),
            Value::Null => Mapping::new(),
            other => {
                let kind = node::kind_name(other);
                self.raise_error(format!("Rules must be given as a mapping, got {kind}"));
                self.depth -= 1;
                return Ok(());
            }
        };

        self.schema.push_node(Some(Value::Mapping(rules.clone())), None);
        let registry = self.rules;
        for priority in RulePriority::ALL {
            // Scoped policy is installed by now, including any the
            // rule-set itself declares.
            if priority == RulePriority::Normalization && self.policy(Policy::RequireAll) {
                set_key(&mut rules, "required", Value::Bool(true));
                self.schema.replace_top(Some(Value::Mapping(rules.clone())));
            }
            for (key, argument) in &rules {
                let name = key_text(key);
                let Some(rule) = registry.lookup(priority, &name) else {
                    continue;
                };
                log::trace!("{} rule '{name}' at {}", priority, self.document.string_path());
                self.schema.push_node(Some(argument.clone()), None);
                rule.apply(self)?;
                self.schema.pop();
            }
        }
        self.schema.pop();

        self.depth -= 1;
        Ok(())
    }

    /// The argument of the rule being applied.
    pub fn argument(&self) -> Option<&Value> {
        self.schema.peek(0).map(untag)
    }

    /// The rule-set the current rule belongs to.
    pub fn rule_set(&self) -> Option<&Value> {
        self.schema.peek(1).map(untag)
    }

    /// Schema node `level` frames below the top (0 = rule argument).
    pub fn schema_at(&self, level: usize) -> Option<&Value> {
        self.schema.peek(level)
    }

    /// Sibling rule in the current rule-set, e.g. `type`.
    pub fn sibling_rule(&self, name: &str) -> Option<&Value> {
        node::child_by_key(self.rule_set(), name).map(untag)
    }

    /// The document node being validated; `None` when undefined.
    pub fn value(&self) -> Option<&Value> {
        self.document.peek(0).map(untag)
    }

    /// Document node `level` frames below the current one.
    pub fn document_at(&self, level: usize) -> Option<&Value> {
        self.document.peek(level)
    }

    /// Replace the current document node (normalization).
    pub fn set_value(&mut self, value: Option<Value>) {
        self.document.replace_top(value);
    }

    /// Resolve a cross-field reference relative to the document node
    /// `level` frames below the current one.
    pub fn lookup(&self, key: &str, level: usize) -> Option<&Value> {
        self.document.path_lookup(key, level)
    }

    pub fn path(&self) -> String {
        self.document.string_path()
    }

    pub fn document_stack_mut(&mut self) -> &mut NodeStack {
        &mut self.document
    }

    /// Name of the mapping field being validated, if any.
    pub fn current_field(&self) -> Option<&str> {
        self.fields
            .last()
            .filter(|f| f.depth == self.document.depth())
            .map(|f| f.name.as_str())
    }

    /// Move the current field's value under `new_name` once it has been
    /// validated. Returns `false` outside of a mapping walk.
    pub fn rename_current_field(&mut self, new_name: &str) -> bool {
        let depth = self.document.depth();
        match self.fields.last_mut() {
            Some(frame) if frame.depth == depth => {
                frame.rename_to = Some(new_name.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn policy(&self, policy: Policy) -> bool {
        self.policies.stack(policy).last().copied().unwrap_or(false)
    }

    /// Install a new value for `policy` until the matching `pop_policy`.
    pub fn push_policy(&mut self, policy: Policy, value: bool) {
        self.policies.stack_mut(policy).push(value);
    }

    /// Restore the enclosing value of `policy`.
    pub fn pop_policy(&mut self, policy: Policy) {
        let stack = self.policies.stack_mut(policy);
        if stack.len() > 1 {
            stack.pop();
        }
    }

    pub fn type_named(&self, name: &str) -> Option<&'v dyn TypeDescriptor> {
        let types: &'v TypeRegistry = self.types;
        types.lookup(name).map(|t| t.as_ref())
    }

    /// Resolve the type used to compare the current value, from the
    /// sibling `type` rule. With several declared types the first one the
    /// value converts to wins.
    ///
    /// Raises an error and returns `None` when no usable type is declared.
    /// Also returns `None`, silently, when the value does not convert: the
    /// `type` rule reports that.
    pub fn comparison_type(
        &mut self,
        rule: &str,
        value: &Value,
    ) -> Option<(String, &'v dyn TypeDescriptor)> {
        let declared: Vec<String> = match self.sibling_rule("type") {
            Some(t) => node::as_list(t).into_iter().filter_map(node::scalar_text).collect(),
            None => Vec::new(),
        };
        let scalar: Vec<&String> = declared
            .iter()
            .filter(|name| name.as_str() != "list" && name.as_str() != "dict")
            .collect();
        if scalar.is_empty() {
            self.raise_error(format!("Rule '{rule}' needs a scalar 'type' to compare values"));
            return None;
        }

        let mut unknown = Vec::new();
        for name in scalar {
            match self.type_named(name) {
                Some(descriptor) if descriptor.is_convertible(value) => {
                    return Some((name.clone(), descriptor));
                }
                Some(_) => {}
                None => unknown.push(name.clone()),
            }
        }
        for name in unknown {
            self.raise_error(format!("Rule '{rule}' refers to unknown type '{name}'"));
        }
        None
    }

    /// Resolve a sub-schema argument: a string names a registered schema,
    /// which is checked and normalized for `shape` on first use.
    pub fn resolve_schema(&mut self, argument: &Value, shape: SchemaShape) -> Result<Value> {
        let Value::String(name) = untag(argument) else {
            return Ok(untag(argument).clone());
        };
        let key = (name.clone(), shape);
        if let Some(checked) = self.checked.get(&key) {
            return Ok(checked.clone());
        }
        let schema = self
            .schemas
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownSchema(name.clone()))?;
        if !self.schema_validation {
            return Ok(schema);
        }

        log::debug!("Checking named schema '{name}'");
        let checker = SchemaChecker::new(self.rules, self.types, self.schemas, self.max_depth);
        let checked = match shape {
            SchemaShape::Mapping => checker.check_schema(name, &schema)?,
            SchemaShape::RuleSet => checker.check_rule_set(name, &schema)?,
        };
        self.checked.insert(key, checked.clone());
        Ok(checked)
    }

    /// Compile `pattern` as a full-match regex, once per pass.
    pub fn full_match_regex(&mut self, pattern: &str) -> std::result::Result<Regex, regex::Error> {
        if let Some(re) = self.regexes.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(&format!("^(?:{pattern})$"))?;
        self.regexes.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Where a field that declares `rename` lives when its own key is
    /// absent but its rename target is already present in the mapping.
    fn renamed_location(&self, field: &str, rules: &Value) -> Option<String> {
        let target = node::child_by_key(Some(rules), "rename").and_then(scalar_text)?;
        let parent = self.document.peek(0);
        let present = |key: &str| node::child_by_key(parent, key).is_some();
        (target != field && !present(field) && present(&target)).then_some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    struct Fixture {
        rules: RuleRegistry,
        types: TypeRegistry,
        schemas: HashMap<String, Value>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                rules: RuleRegistry::with_builtins(),
                types: TypeRegistry::with_builtins(),
                schemas: HashMap::new(),
            }
        }

        fn context(&self, defaults: PolicyDefaults) -> ValidationContext<'_> {
            ValidationContext::new(&self.rules, &self.types, &self.schemas, defaults, 32)
        }
    }

    #[test]
    fn test_walk_applies_defaults_in_place() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults::default());
        ctx.reset(Some(yaml("question: What is 6x9?")));
        let ok = ctx
            .validate_mapping(&yaml("answer: {type: integer, default: 42}\nquestion: {type: string}"))
            .unwrap();
        assert!(ok);
        let (doc, errors) = ctx.finish();
        assert!(errors.is_empty());
        assert_eq!(doc, yaml("question: What is 6x9?\nanswer: 42"));
    }

    #[test]
    fn test_errors_carry_paths() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults::default());
        ctx.reset(Some(yaml("user: {name: 7, extra: true}")));
        let ok = ctx
            .validate_mapping(&yaml("user: {type: dict, schema: {name: {type: string}}}"))
            .unwrap();
        assert!(!ok);
        let paths: Vec<&str> = ctx.errors().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["^user.name", "^user.extra"]);
    }

    #[test]
    fn test_non_mapping_document() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults::default());
        ctx.reset(Some(yaml("[1, 2]")));
        assert!(!ctx.validate_mapping(&yaml("a: {type: integer}")).unwrap());
        assert_eq!(ctx.errors()[0].path, "^");
    }

    #[test]
    fn test_policies_nest_and_restore() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults {
            allow_unknown: true,
            ..PolicyDefaults::default()
        });
        assert!(ctx.policy(Policy::AllowUnknown));
        ctx.push_policy(Policy::AllowUnknown, false);
        ctx.push_policy(Policy::AllowUnknown, true);
        ctx.pop_policy(Policy::AllowUnknown);
        assert!(!ctx.policy(Policy::AllowUnknown));
        ctx.pop_policy(Policy::AllowUnknown);
        ctx.pop_policy(Policy::AllowUnknown);
        assert!(ctx.policy(Policy::AllowUnknown));
    }

    #[test]
    fn test_recursion_limit() {
        let fixture = Fixture {
            schemas: HashMap::from([(
                "node".to_string(),
                yaml("child: {type: dict, schema: node}"),
            )]),
            ..Fixture::new()
        };
        let mut ctx = fixture.context(PolicyDefaults::default());
        let mut doc = String::from("{}");
        for _ in 0..40 {
            doc = format!("{{child: {doc}}}");
        }
        ctx.reset(Some(yaml(&doc)));
        let err = ctx.validate_mapping(&yaml("child: {type: dict, schema: node}")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::WardenError::Schema(SchemaError::RecursionLimit { limit: 32, .. })
        ));
    }

    #[test]
    fn test_rename_outside_a_field_is_an_error() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults::default());
        ctx.reset(Some(yaml("l: [1]")));
        assert!(!ctx.validate_mapping(&yaml("l: {type: list, schema: {rename: x}}")).unwrap());
        assert_eq!(ctx.errors()[0].path, "^l[0]");
        let (doc, _) = ctx.finish();
        assert_eq!(doc, yaml("l: [1]"));
    }

    #[test]
    fn test_require_all_forces_declaring_field() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults::default());
        ctx.reset(Some(yaml("{}")));
        let schema = yaml(
            "sub: {type: dict, require_all: true, schema: {a: {type: integer}}}
opt: {type: integer}",
        );
        assert!(!ctx.validate_mapping(&schema).unwrap());
        let paths: Vec<&str> = ctx.errors().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["^sub"]);
        assert!(!ctx.policy(Policy::RequireAll));
    }

    #[test]
    fn test_require_all_overrides_required_false() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults {
            require_all: true,
            ..PolicyDefaults::default()
        });
        ctx.reset(Some(yaml("{}")));
        assert!(!ctx.validate_mapping(&yaml("a: {type: string, required: false}")).unwrap());
        assert!(ctx.errors()[0].message.contains("required"));
    }

    #[test]
    fn test_rename_keeps_existing_target() {
        let fixture = Fixture::new();
        let schema = yaml("name: {type: string, default: John Doe, rename: user}");
        for (input, output) in [
            ("{}", "user: John Doe"),
            ("name: Ada", "user: Ada"),
            ("user: Ada", "user: Ada"),
        ] {
            let mut ctx = fixture.context(PolicyDefaults::default());
            ctx.reset(Some(yaml(input)));
            assert!(ctx.validate_mapping(&schema).unwrap(), "{input}: {:?}", ctx.errors());
            let (doc, _) = ctx.finish();
            assert_eq!(doc, yaml(output), "{input}");
        }
    }

    #[test]
    fn test_named_schema_checked_once_on_use() {
        let fixture = Fixture {
            schemas: HashMap::from([
                ("point".to_string(), yaml("x: {type: integer}")),
                ("bad".to_string(), yaml("x: {required: notabool}")),
            ]),
            ..Fixture::new()
        };
        let mut ctx = fixture.context(PolicyDefaults::default());
        ctx.set_schema_validation(true);
        let point = ctx.resolve_schema(&yaml("point"), SchemaShape::Mapping).unwrap();
        assert_eq!(point, yaml("x: {type: integer, nullable: false}"));
        assert!(ctx.checked.contains_key(&("point".to_string(), SchemaShape::Mapping)));
        let err = ctx.resolve_schema(&yaml("bad"), SchemaShape::Mapping).unwrap_err();
        assert!(err.is_schema_error());

        let mut unchecked = fixture.context(PolicyDefaults::default());
        let raw = unchecked.resolve_schema(&yaml("bad"), SchemaShape::Mapping).unwrap();
        assert_eq!(raw, yaml("x: {required: notabool}"));
    }

    #[test]
    fn test_regex_cache_reuses_compiled_pattern() {
        let fixture = Fixture::new();
        let mut ctx = fixture.context(PolicyDefaults::default());
        let re = ctx.full_match_regex("[a-z]+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abc1"));
        assert_eq!(ctx.regexes.len(), 1);
        ctx.full_match_regex("[a-z]+").unwrap();
        assert_eq!(ctx.regexes.len(), 1);
        assert!(ctx.full_match_regex("(").is_err());
    }
}
