//! Checking user schemas against the schema-of-schemas.
//!
//! Every rule-set is validated as a document against the meta-schema
//! built from the registered rules. The normalized rule-set (with
//! defaults such as `nullable: false` filled in) replaces the user's
//! for the actual document pass.

use crate::context::{PolicyDefaults, ValidationContext};
use crate::error::{Result, SchemaError};
use crate::node::{self, key_text, untag};
use crate::rules::RuleRegistry;
use crate::types::TypeRegistry;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

pub(crate) struct SchemaChecker<'v> {
    rules: &'v RuleRegistry,
    types: &'v TypeRegistry,
    schemas: &'v HashMap<String, Value>,
    max_depth: usize,
    meta: Value,
}

impl<'v> SchemaChecker<'v> {
    pub(crate) fn new(
        rules: &'v RuleRegistry,
        types: &'v TypeRegistry,
        schemas: &'v HashMap<String, Value>,
        max_depth: usize,
    ) -> Self {
        SchemaChecker {
            rules,
            types,
            schemas,
            max_depth,
            meta: Value::Mapping(rules.schema_of_schemas().clone()),
        }
    }

    /// Check every field of a mapping schema, returning the normalized schema.
    pub(crate) fn check_schema(&self, prefix: &str, schema: &Value) -> Result<Value> {
        let Value::Mapping(fields) = untag(schema) else {
            return Err(SchemaError::NotAMapping.into());
        };
        let mut checked = Mapping::new();
        for (field, rules) in fields {
            let name = qualify(prefix, &key_text(field));
            checked.insert(field.clone(), self.check_rule_set(&name, rules)?);
        }
        Ok(Value::Mapping(checked))
    }

    /// Validate one rule-set as a document against the schema-of-schemas,
    /// then descend into any nested rule-sets it carries.
    pub(crate) fn check_rule_set(&self, field: &str, rules: &Value) -> Result<Value> {
        // Meta-walk contexts never check schemas themselves.
        let mut ctx = ValidationContext::new(
            self.rules,
            self.types,
            self.schemas,
            PolicyDefaults::default(),
            self.max_depth,
        );
        ctx.reset(Some(rules.clone()));
        let ok = ctx.validate_mapping(&self.meta)?;
        let (mut normalized, errors) = ctx.finish();
        if !ok {
            log::debug!("Rules for field '{field}' failed the schema check");
            return Err(SchemaError::Malformed {
                field: field.to_string(),
                errors,
            }
            .into());
        }
        self.check_nested(field, &mut normalized)?;
        Ok(normalized)
    }

    /// Sub-schemas given by name are checked when they are first used.
    fn check_nested(&self, field: &str, rules: &mut Value) -> Result<()> {
        let structural = node::child_by_key(Some(&*rules), "type")
            .and_then(node::scalar_text)
            .filter(|t| t == "dict" || t == "list");
        let Value::Mapping(map) = rules else {
            return Ok(());
        };

        for key in ["keysrules", "valuesrules"] {
            if let Some(sub) = map.get_mut(key) {
                if sub.is_mapping() {
                    *sub = self.check_rule_set(&qualify(field, key), sub)?;
                }
            }
        }
        if let Some(Value::Sequence(sets)) = map.get_mut("items") {
            for (i, sub) in sets.iter_mut().enumerate() {
                if sub.is_mapping() {
                    *sub = self.check_rule_set(&format!("{field}.items[{i}]"), sub)?;
                }
            }
        }
        if let Some(sub) = map.get_mut("schema") {
            if sub.is_mapping() {
                match structural.as_deref() {
                    Some("dict") => *sub = self.check_schema(&qualify(field, "schema"), sub)?,
                    Some("list") => *sub = self.check_rule_set(&qualify(field, "schema"), sub)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
