//! Cross-field rules. References are resolved relative to the mapping
//! that holds the current field; a leading `^` starts at the document root.

use super::{arg_schema, of_type, RuleRegistry, RulePriority};
use crate::context::ValidationContext;
use crate::error::Result;
use crate::node::{as_list, display, key_text, scalar_text};
use serde_yaml::Value;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.insert(
        "dependencies",
        arg_schema(&[of_type(&["string", "list", "dict"])]),
        RulePriority::Validation,
        dependencies,
    );
    registry.insert(
        "excludes",
        arg_schema(&[of_type(&["string", "list"])]),
        RulePriority::Validation,
        excludes,
    );
}

fn dependencies(ctx: &mut ValidationContext<'_>) -> Result<()> {
    if ctx.value().is_none() {
        return Ok(());
    }
    let Some(argument) = ctx.argument().cloned() else {
        return Ok(());
    };

    if let Value::Mapping(required) = &argument {
        for (field, options) in required {
            let field = key_text(field);
            let Some(found) = ctx.lookup(&field, 1).cloned() else {
                ctx.raise_error(format!("Field '{field}' is required by this field"));
                continue;
            };
            let options = as_list(options);
            let found_text = scalar_text(&found);
            let satisfied = options
                .iter()
                .any(|option| scalar_text(option).is_some() && scalar_text(option) == found_text);
            if !satisfied {
                let choices: Vec<String> = options.into_iter().map(display).collect();
                ctx.raise_error(format!(
                    "Field '{field}' must be one of [{}] for this field, got '{}'",
                    choices.join(", "),
                    display(&found)
                ));
            }
        }
        return Ok(());
    }

    let fields: Vec<String> = as_list(&argument).into_iter().filter_map(scalar_text).collect();
    for field in fields {
        if ctx.lookup(&field, 1).is_none() {
            ctx.raise_error(format!("Field '{field}' is required by this field"));
        }
    }
    Ok(())
}

fn excludes(ctx: &mut ValidationContext<'_>) -> Result<()> {
    if ctx.value().is_none() {
        return Ok(());
    }
    let fields: Vec<String> = ctx
        .argument()
        .map(|arg| as_list(arg).into_iter().filter_map(scalar_text).collect())
        .unwrap_or_default();
    for field in fields {
        if ctx.lookup(&field, 1).is_some() {
            ctx.raise_error(format!("Field '{field}' must not be present together with this field"));
        }
    }
    Ok(())
}
