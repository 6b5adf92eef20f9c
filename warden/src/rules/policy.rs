//! Scoped policy rules: `allow_unknown`, `purge_unknown`, `require_all`.
//!
//! Each is a pair of descriptors under the same name. The `First` half
//! installs the rule's value for the rest of the rule-set (including any
//! sub-schema it recurses into); the `Last` half restores the enclosing
//! value. Both halves fire whenever the key is present, so they always pair.

use super::{arg_schema, of_type, RulePriority, RuleRegistry};
use crate::context::{Policy, ValidationContext};
use crate::error::Result;
use serde_yaml::Value;

pub(crate) fn register(registry: &mut RuleRegistry) {
    for (name, policy) in [
        ("allow_unknown", Policy::AllowUnknown),
        ("purge_unknown", Policy::PurgeUnknown),
        ("require_all", Policy::RequireAll),
    ] {
        let argument = arg_schema(&[of_type(&["boolean"])]);
        registry.insert(name, argument.clone(), RulePriority::First, move |ctx| {
            enter_scope(ctx, name, policy)
        });
        registry.insert(name, argument, RulePriority::Last, move |ctx| {
            ctx.pop_policy(policy);
            Ok(())
        });
    }
}

fn enter_scope(ctx: &mut ValidationContext<'_>, name: &str, policy: Policy) -> Result<()> {
    let value = match ctx.argument() {
        Some(Value::Bool(b)) => *b,
        _ => {
            ctx.raise_error(format!("Rule '{name}' expects a boolean"));
            ctx.policy(policy)
        }
    };
    ctx.push_policy(policy, value);
    Ok(())
}
