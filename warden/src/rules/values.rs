//! Rules that constrain a single value.

use super::{arg_schema, of_type, RulePriority, RuleRegistry};
use crate::context::ValidationContext;
use crate::error::Result;
use crate::node::{self, as_list, display, length, scalar_text, untag};
use serde_yaml::Value;

pub(crate) fn register(registry: &mut RuleRegistry) {
    let v = RulePriority::Validation;
    let boolean = || arg_schema(&[of_type(&["boolean"])]);
    // Comparison rules need a sibling `type` to know how to compare.
    let typed_list = || arg_schema(&[of_type(&["list"]), ("dependencies", Value::from("type"))]);
    let typed_bound = || arg_schema(&[("dependencies", Value::from("type"))]);
    let length_bound = || {
        arg_schema(&[
            of_type(&["integer"]),
            ("min", Value::from(-1)),
            ("dependencies", arg_schema(&[of_type(&["list", "dict"])])),
        ])
    };

    registry.insert("required", boolean(), v, required);
    registry.insert(
        "nullable",
        arg_schema(&[of_type(&["boolean"]), ("default", Value::Bool(false))]),
        v,
        nullable,
    );
    registry.insert("allowed", typed_list(), v, allowed);
    registry.insert("forbidden", typed_list(), v, forbidden);
    registry.insert("min", typed_bound(), v, min);
    registry.insert("max", typed_bound(), v, max);
    registry.insert("minlength", length_bound(), v, minlength);
    registry.insert("maxlength", length_bound(), v, maxlength);
    registry.insert("empty", boolean(), v, empty);
    registry.insert("regex", arg_schema(&[of_type(&["string"])]), v, regex);
    registry.insert("contains", arg_schema(&[of_type(&["string", "list"])]), v, contains);
    // Annotations only; never validated.
    registry.insert("meta", arg_schema(&[]), v, |_| Ok(()));
}

/// The current value, unless it is undefined or null.
fn present_value(ctx: &ValidationContext<'_>) -> Option<Value> {
    match ctx.value() {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    }
}

fn flag(ctx: &ValidationContext<'_>) -> Option<bool> {
    match ctx.argument() {
        Some(Value::Bool(b)) => Some(*b),
        _ => None,
    }
}

fn required(ctx: &mut ValidationContext<'_>) -> Result<()> {
    if flag(ctx) == Some(true) && ctx.value().is_none() {
        ctx.raise_error("Value is required but missing");
    }
    Ok(())
}

fn nullable(ctx: &mut ValidationContext<'_>) -> Result<()> {
    if flag(ctx) == Some(false) && matches!(ctx.value(), Some(Value::Null)) {
        ctx.raise_error("Value must not be null");
    }
    Ok(())
}

fn declares_list(ctx: &ValidationContext<'_>) -> bool {
    ctx.sibling_rule("type")
        .map(|t| as_list(t).iter().any(|name| name.as_str() == Some("list")))
        .unwrap_or(false)
}

/// Whether `value` equals one of `candidates`. Sequences (with `type: list`)
/// are compared element by element, structurally.
fn matches_any(
    ctx: &mut ValidationContext<'_>,
    rule: &str,
    value: &Value,
    candidates: &[Value],
) -> Option<Vec<Value>> {
    if let Value::Sequence(items) = value {
        if declares_list(ctx) {
            let hits = items
                .iter()
                .filter(|item| candidates.iter().any(|c| untag(c) == untag(item)))
                .cloned()
                .collect();
            return Some(hits);
        }
    }
    let (_, descriptor) = ctx.comparison_type(rule, value)?;
    let hits = candidates
        .iter()
        .filter(|c| descriptor.equal(c, value))
        .cloned()
        .collect();
    Some(hits)
}

fn candidates(ctx: &ValidationContext<'_>) -> Vec<Value> {
    ctx.argument()
        .map(|arg| as_list(arg).into_iter().cloned().collect())
        .unwrap_or_default()
}

fn allowed(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let options = candidates(ctx);
    if let Value::Sequence(items) = &value {
        if declares_list(ctx) {
            let disallowed: Vec<String> = items
                .iter()
                .filter(|item| !options.iter().any(|o| untag(o) == untag(item)))
                .map(display)
                .collect();
            if !disallowed.is_empty() {
                ctx.raise_error(format!("Values not allowed: {}", disallowed.join(", ")));
            }
            return Ok(());
        }
    }
    if let Some(hits) = matches_any(ctx, "allowed", &value, &options) {
        if hits.is_empty() {
            ctx.raise_error(format!(
                "Value '{}' is not one of the allowed values {}",
                display(&value),
                display(&Value::Sequence(options))
            ));
        }
    }
    Ok(())
}

fn forbidden(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let options = candidates(ctx);
    if let Some(hits) = matches_any(ctx, "forbidden", &value, &options) {
        for hit in hits {
            ctx.raise_error(format!("Value '{}' is forbidden", display(&hit)));
        }
    }
    Ok(())
}

/// Shared body of `min` and `max`; both bounds are exclusive.
fn bound(ctx: &mut ValidationContext<'_>, rule: &str, is_min: bool) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let Some(limit) = ctx.argument().cloned() else {
        return Ok(());
    };
    let Some((type_name, descriptor)) = ctx.comparison_type(rule, &value) else {
        return Ok(());
    };
    if !descriptor.is_convertible(&limit) {
        ctx.raise_error(format!(
            "Rule '{rule}' bound {} is not a valid {type_name}",
            display(&limit)
        ));
        return Ok(());
    }
    if is_min && !descriptor.less(&limit, &value) {
        ctx.raise_error(format!(
            "Value {} must be greater than {}",
            display(&value),
            display(&limit)
        ));
    }
    if !is_min && !descriptor.less(&value, &limit) {
        ctx.raise_error(format!(
            "Value {} must be less than {}",
            display(&value),
            display(&limit)
        ));
    }
    Ok(())
}

fn min(ctx: &mut ValidationContext<'_>) -> Result<()> {
    bound(ctx, "min", true)
}

fn max(ctx: &mut ValidationContext<'_>) -> Result<()> {
    bound(ctx, "max", false)
}

/// Shared body of `minlength` and `maxlength`.
fn length_bound(ctx: &mut ValidationContext<'_>, rule: &str, is_min: bool) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let Some(limit) = ctx.argument().and_then(Value::as_u64) else {
        ctx.raise_error(format!("Rule '{rule}' expects a non-negative integer"));
        return Ok(());
    };
    let Some(count) = length(&value) else {
        ctx.raise_error(format!(
            "Rule '{rule}' applies only to lists and dicts, got {}",
            node::kind_name(&value)
        ));
        return Ok(());
    };
    let count = count as u64;
    if is_min && count < limit {
        ctx.raise_error(format!("Length {count} is shorter than the minimum {limit}"));
    }
    if !is_min && count > limit {
        ctx.raise_error(format!("Length {count} is longer than the maximum {limit}"));
    }
    Ok(())
}

fn minlength(ctx: &mut ValidationContext<'_>) -> Result<()> {
    length_bound(ctx, "minlength", true)
}

fn maxlength(ctx: &mut ValidationContext<'_>) -> Result<()> {
    length_bound(ctx, "maxlength", false)
}

fn empty(ctx: &mut ValidationContext<'_>) -> Result<()> {
    if flag(ctx) == Some(false) {
        if let Some(Value::Sequence(items)) = ctx.value() {
            if items.is_empty() {
                ctx.raise_error("Empty list is not allowed");
            }
        }
    }
    Ok(())
}

fn regex(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let Some(pattern) = ctx.argument().and_then(Value::as_str).map(str::to_string) else {
        ctx.raise_error("Rule 'regex' expects a pattern string");
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        ctx.raise_error(format!(
            "Rule 'regex' applies only to strings, got {}",
            node::kind_name(&value)
        ));
        return Ok(());
    };
    match ctx.full_match_regex(&pattern) {
        Ok(re) if re.is_match(text) => {}
        Ok(_) => ctx.raise_error(format!("Value '{text}' does not match pattern '{pattern}'")),
        Err(e) => ctx.raise_error(format!("Invalid regex pattern '{pattern}': {e}")),
    }
    Ok(())
}

fn contains(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(value) = present_value(ctx) else {
        return Ok(());
    };
    let Value::Sequence(items) = &value else {
        ctx.raise_error(format!(
            "Rule 'contains' applies only to lists, got {}",
            node::kind_name(&value)
        ));
        return Ok(());
    };
    let present: Vec<String> = items.iter().filter_map(scalar_text).collect();
    let missing: Vec<String> = candidates(ctx)
        .iter()
        .filter_map(scalar_text)
        .filter(|needed| !present.contains(needed))
        .collect();
    if !missing.is_empty() {
        ctx.raise_error(format!("Missing required elements: {}", missing.join(", ")));
    }
    Ok(())
}
