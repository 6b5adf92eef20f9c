//! Rules that recurse into sub-documents: `items`, `keysrules`,
//! `valuesrules` and `schema`.

use super::{arg_schema, of_type, RulePriority, RuleRegistry};
use crate::context::{SchemaShape, ValidationContext};
use crate::error::Result;
use crate::node::{self, key_text, scalar_text};
use crate::stack::PathStep;
use serde_yaml::Value;

pub(crate) fn register(registry: &mut RuleRegistry) {
    let v = RulePriority::Validation;
    let sub_schema = || arg_schema(&[of_type(&["dict", "string"])]);
    registry.insert("items", arg_schema(&[of_type(&["list"])]), v, items);
    registry.insert("keysrules", sub_schema(), v, keysrules);
    registry.insert("valuesrules", sub_schema(), v, valuesrules);
    registry.insert("schema", sub_schema(), v, schema);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubSchemaKind {
    Dict,
    List,
}

fn present_value(ctx: &ValidationContext<'_>) -> Option<Value> {
    match ctx.value() {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    }
}

/// Positional: element `i` is validated against rule-set `i`.
fn items(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let Value::Sequence(elements) = &value else {
        ctx.raise_error(format!(
            "Rule 'items' applies only to lists, got {}",
            node::kind_name(&value)
        ));
        return Ok(());
    };
    let rule_sets: Vec<Value> = match ctx.argument() {
        Some(Value::Sequence(sets)) => sets.clone(),
        _ => Vec::new(),
    };
    if rule_sets.len() != elements.len() {
        ctx.raise_error(format!(
            "Expected {} items, got {}",
            rule_sets.len(),
            elements.len()
        ));
    }
    for (index, rules) in rule_sets.iter().enumerate().take(elements.len()) {
        let rules = ctx.resolve_schema(rules, SchemaShape::RuleSet)?;
        ctx.document_stack_mut().push_index(index);
        ctx.validate_item(&rules)?;
        ctx.document_stack_mut().pop_into_parent();
    }
    Ok(())
}

/// Every key of a dict, taken as a value, must satisfy the rule-set.
fn keysrules(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(Value::Mapping(map)) = present_value(ctx) else {
        return Ok(());
    };
    let Some(argument) = ctx.argument().cloned() else {
        return Ok(());
    };
    let rules = ctx.resolve_schema(&argument, SchemaShape::RuleSet)?;
    for key in map.keys() {
        let step = PathStep::Key(key_text(key));
        ctx.document_stack_mut().push_node(Some(key.clone()), Some(step));
        ctx.validate_item(&rules)?;
        ctx.document_stack_mut().pop();
    }
    Ok(())
}

/// Every value of a dict must satisfy the rule-set.
fn valuesrules(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(Value::Mapping(map)) = present_value(ctx) else {
        return Ok(());
    };
    let Some(argument) = ctx.argument().cloned() else {
        return Ok(());
    };
    let rules = ctx.resolve_schema(&argument, SchemaShape::RuleSet)?;
    for key in map.keys() {
        ctx.document_stack_mut().push_key(&key_text(key));
        ctx.validate_item(&rules)?;
        ctx.document_stack_mut().pop_into_parent();
    }
    Ok(())
}

/// Sub-schema validation. An explicit `type: dict|list` picks the form;
/// otherwise the kind of the value does. The dict form walks a mapping
/// schema; the list form applies one rule-set to every element.
fn schema(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let declared = match ctx.sibling_rule("type").and_then(scalar_text).as_deref() {
        Some("dict") => Some(SubSchemaKind::Dict),
        Some("list") => Some(SubSchemaKind::List),
        _ => None,
    };
    let actual = match &value {
        Value::Mapping(_) => Some(SubSchemaKind::Dict),
        Value::Sequence(_) => Some(SubSchemaKind::List),
        _ => None,
    };
    let kind = match (declared, actual) {
        (_, None) if declared.is_none() => {
            ctx.raise_error(format!(
                "Rule 'schema' applies only to dicts and lists, got {}",
                node::kind_name(&value)
            ));
            return Ok(());
        }
        // A mismatch is reported by the `type` rule.
        (Some(d), Some(a)) if d != a => return Ok(()),
        (_, None) => return Ok(()),
        (_, Some(a)) => a,
    };

    let Some(argument) = ctx.argument().cloned() else {
        return Ok(());
    };
    match kind {
        SubSchemaKind::Dict => {
            let sub = ctx.resolve_schema(&argument, SchemaShape::Mapping)?;
            ctx.validate_mapping(&sub)?;
        }
        SubSchemaKind::List => {
            let sub = ctx.resolve_schema(&argument, SchemaShape::RuleSet)?;
            let count = node::length(&value).unwrap_or(0);
            for index in 0..count {
                ctx.document_stack_mut().push_index(index);
                ctx.validate_item(&sub)?;
                ctx.document_stack_mut().pop_into_parent();
            }
        }
    }
    Ok(())
}
