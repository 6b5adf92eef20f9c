//! The public entry point.

use crate::bootstrap::SchemaChecker;
use crate::config::{ValidatorConfig, DEFAULT_MAX_DEPTH};
use crate::context::{PolicyDefaults, ValidationContext};
use crate::error::{Result, SchemaError, ValidationErrorItem};
use crate::node::{self, untag};
use crate::rules::{RulePriority, RuleRegistry};
use crate::types::{FromNode, TypeDescriptor, TypeRegistry};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Validates and normalizes documents against a schema.
///
/// Each instance owns its own rule, type and named-schema registries.
/// Configure it once, then call `validate` as often as needed; every call
/// works on a private copy of the document.
///
/// ```
/// use warden::Validator;
///
/// let schema = serde_yaml::from_str("answer: {type: integer, default: 42}").unwrap();
/// let mut validator = Validator::with_schema(schema);
/// assert!(validator.validate(&serde_yaml::Value::Null).unwrap());
/// assert_eq!(validator.document()["answer"], serde_yaml::Value::from(42));
/// ```
pub struct Validator {
    schema: Value,
    rules: RuleRegistry,
    types: TypeRegistry,
    schemas: HashMap<String, Value>,
    defaults: PolicyDefaults,
    schema_validation: bool,
    max_depth: usize,
    document: Value,
    errors: Vec<ValidationErrorItem>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A validator without a bound schema; use `validate_with`.
    pub fn new() -> Self {
        Self::with_schema(Value::Null)
    }

    pub fn with_schema(schema: Value) -> Self {
        Validator {
            schema,
            rules: RuleRegistry::with_builtins(),
            types: TypeRegistry::with_builtins(),
            schemas: HashMap::new(),
            defaults: PolicyDefaults::default(),
            schema_validation: true,
            max_depth: DEFAULT_MAX_DEPTH,
            document: Value::Null,
            errors: Vec::new(),
        }
    }

    pub fn from_config(schema: Value, config: ValidatorConfig) -> Self {
        let mut validator = Self::with_schema(schema);
        validator.set_allow_unknown(config.allow_unknown);
        validator.set_purge_unknown(config.purge_unknown);
        validator.set_require_all(config.require_all);
        validator.set_schema_validation(config.schema_validation);
        validator.set_max_depth(config.max_depth);
        for (name, schema) in config.registry {
            validator.register_schema(name, schema);
        }
        validator
    }

    /// Register a type for the `type` rule and for comparisons.
    pub fn register_type(&mut self, name: impl Into<String>, descriptor: Arc<dyn TypeDescriptor>) {
        self.types.register(name, descriptor);
    }

    /// Register a native Rust type; equality and ordering come from `PartialOrd`.
    pub fn register_native_type<T>(&mut self, name: impl Into<String>)
    where
        T: FromNode + PartialOrd + 'static,
    {
        self.types.register_native::<T>(name);
    }

    /// Register a custom rule at `Validation` priority. `fragment` is a
    /// single-key mapping: the key names the rule, the value is the schema
    /// its argument must satisfy.
    pub fn register_rule<F>(&mut self, fragment: &Value, behavior: F) -> Result<()>
    where
        F: Fn(&mut ValidationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register_rule_with_priority(fragment, behavior, RulePriority::Validation)
    }

    pub fn register_rule_with_priority<F>(
        &mut self,
        fragment: &Value,
        behavior: F,
        priority: RulePriority,
    ) -> Result<()>
    where
        F: Fn(&mut ValidationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.rules.register_fragment(fragment, behavior, priority)
    }

    /// Register a schema that `schema:` rules (and `validate_named`) can
    /// refer to by name.
    pub fn register_schema(&mut self, name: impl Into<String>, schema: Value) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn set_allow_unknown(&mut self, value: bool) {
        self.defaults.allow_unknown = value;
    }

    pub fn set_purge_unknown(&mut self, value: bool) {
        self.defaults.purge_unknown = value;
    }

    pub fn set_require_all(&mut self, value: bool) {
        self.defaults.require_all = value;
    }

    /// Whether schemas are checked against the schema-of-schemas. With this
    /// off, rule keys nobody registered are silently ignored.
    pub fn set_schema_validation(&mut self, value: bool) {
        self.schema_validation = value;
    }

    pub fn set_max_depth(&mut self, value: usize) {
        self.max_depth = value.max(1);
    }

    /// Validate against the schema given at construction.
    pub fn validate(&mut self, document: &Value) -> Result<bool> {
        let schema = self.schema.clone();
        self.validate_with(document, &schema)
    }

    /// Validate against a registered schema.
    pub fn validate_named(&mut self, document: &Value, name: &str) -> Result<bool> {
        self.validate_with(document, &Value::String(name.to_string()))
    }

    /// Validate against `schema`; a string is taken as the name of a
    /// registered schema.
    ///
    /// Returns `Ok(false)` with `errors()` populated when the document does
    /// not conform, and `Err` when the schema itself is unusable.
    pub fn validate_with(&mut self, document: &Value, schema: &Value) -> Result<bool> {
        self.document = Value::Null;
        self.errors.clear();

        let schema = match untag(schema) {
            Value::String(name) => self
                .schemas
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::UnknownSchema(name.clone()))?,
            Value::Null => Value::Mapping(Mapping::new()),
            other => other.clone(),
        };
        let schema = if self.schema_validation {
            self.checker().check_schema("", &schema)?
        } else {
            schema
        };

        log::debug!("Validating document against {} field(s)", node::length(&schema).unwrap_or(0));
        let mut ctx = self.context();
        ctx.reset(Some(document.clone()));
        ctx.validate_mapping(&schema)?;
        let (document, errors) = ctx.finish();
        log::debug!("Validation finished with {} error(s)", errors.len());

        self.document = document;
        self.errors = errors;
        Ok(self.errors.is_empty())
    }

    /// The normalized document from the last `validate` call.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn errors(&self) -> &[ValidationErrorItem] {
        &self.errors
    }

    /// The meta-schema user schemas are checked against.
    pub fn schema_of_schemas(&self) -> &Mapping {
        self.rules.schema_of_schemas()
    }

    fn context(&self) -> ValidationContext<'_> {
        let mut ctx = ValidationContext::new(
            &self.rules,
            &self.types,
            &self.schemas,
            self.defaults,
            self.max_depth,
        );
        ctx.set_schema_validation(self.schema_validation);
        ctx
    }

    fn checker(&self) -> SchemaChecker<'_> {
        SchemaChecker::new(&self.rules, &self.types, &self.schemas, self.max_depth)
    }
}
