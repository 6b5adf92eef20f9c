//! Rules that rewrite the document: `default` and `rename`.

use super::{arg_schema, of_type, RulePriority, RuleRegistry};
use crate::context::ValidationContext;
use crate::error::Result;
use crate::node::scalar_text;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.insert("default", arg_schema(&[]), RulePriority::Normalization, default);
    registry.insert(
        "rename",
        arg_schema(&[of_type(&["string"])]),
        RulePriority::PostNormalization,
        rename,
    );
}

/// Fill in an undefined value with the rule's literal argument.
fn default(ctx: &mut ValidationContext<'_>) -> Result<()> {
    if ctx.value().is_none() {
        let literal = ctx.argument().cloned();
        ctx.set_value(literal);
    }
    Ok(())
}

/// Re-home the (already validated) value under a new key in its parent.
fn rename(ctx: &mut ValidationContext<'_>) -> Result<()> {
    let Some(new_name) = ctx.argument().and_then(scalar_text) else {
        ctx.raise_error("Rule 'rename' expects a field name");
        return Ok(());
    };
    if !ctx.rename_current_field(&new_name) {
        ctx.raise_error("Rule 'rename' only applies to fields of a dict");
    }
    Ok(())
}
