use super::{arg_schema, of_type, RulePriority, RuleRegistry};
use crate::context::ValidationContext;
use crate::error::Result;
use crate::node::{as_list, kind_name, scalar_text};
use serde_yaml::Value;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.insert(
        "type",
        arg_schema(&[of_type(&["string", "list"])]),
        RulePriority::TypeChecking,
        type_rule,
    );
}

/// Passes when the value's kind matches a structural name (`list`,
/// `dict`) or it converts to any of the named scalar types. Undefined
/// and null values are left to `required` and `nullable`.
fn type_rule(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let value = match ctx.value() {
        None | Some(Value::Null) => return Ok(()),
        Some(value) => value.clone(),
    };
    let names: Vec<String> = ctx
        .argument()
        .map(|arg| as_list(arg).into_iter().filter_map(scalar_text).collect())
        .unwrap_or_default();

    let mut matched = false;
    let mut unknown = Vec::new();
    for name in &names {
        matched |= match name.as_str() {
            "list" => value.is_sequence(),
            "dict" => value.is_mapping(),
            other => match ctx.type_named(other) {
                Some(descriptor) => descriptor.is_convertible(&value),
                None => {
                    unknown.push(other.to_string());
                    false
                }
            },
        };
    }

    for name in unknown {
        ctx.raise_error(format!("Unknown type '{name}'"));
    }
    if !matched {
        ctx.raise_error(format!(
            "Expected type {}, got {}",
            names.join(" or "),
            kind_name(&value)
        ));
    }
    Ok(())
}
