//! Helpers over `serde_yaml::Value`, the tree type used for both
//! documents and schemas.
//!
//! A node that does not exist at all (missing key, index past the end)
//! is `None`; an explicit YAML `null` is `Some(Value::Null)`.

use serde_yaml::{Mapping, Value};

/// Strip YAML tags so rules only ever see the underlying value.
pub fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// Whether a node exists and is not an explicit null.
pub fn is_present(node: Option<&Value>) -> bool {
    !matches!(node.map(untag), None | Some(Value::Null))
}

/// Human-readable kind name, used in error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match untag(value) {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "dict",
        Value::Tagged(_) => "tagged",
    }
}

/// Textual rendering of a scalar, `None` for null and collections.
pub fn scalar_text(value: &Value) -> Option<String> {
    match untag(value) {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Render a value for an error message without pulling in a serializer.
pub fn display(value: &Value) -> String {
    match untag(value) {
        Value::Null => "null".to_string(),
        Value::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(display).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Mapping(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", display(k), display(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        other => scalar_text(other).unwrap_or_default(),
    }
}

/// Treat a scalar as a one-element list, a sequence as itself and
/// anything else as empty.
pub fn as_list(value: &Value) -> Vec<&Value> {
    match untag(value) {
        Value::Sequence(items) => items.iter().collect(),
        Value::Null | Value::Mapping(_) => Vec::new(),
        scalar => vec![scalar],
    }
}

/// Mapping keys are addressed by their textual form.
pub fn key_text(key: &Value) -> String {
    scalar_text(key).unwrap_or_else(|| display(key))
}

/// Look up a mapping entry by its textual key.
pub fn get_key<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| key_text(k) == key)
            .map(|(_, v)| v)
    })
}

/// Child of `node` under a textual mapping key.
pub fn child_by_key<'a>(node: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    match node.map(untag) {
        Some(Value::Mapping(map)) => get_key(map, key),
        _ => None,
    }
}

/// Child of `node` at a sequence index.
pub fn child_by_index(node: Option<&Value>, index: usize) -> Option<&Value> {
    match node.map(untag) {
        Some(Value::Sequence(items)) => items.get(index),
        _ => None,
    }
}

/// Insert or replace `key` in a mapping, keeping the position of an
/// existing entry (even when stored under a non-string key).
pub fn set_key(map: &mut Mapping, key: &str, value: Value) {
    let existing = map
        .iter()
        .find(|(k, _)| key_text(k) == key)
        .map(|(k, _)| k.clone());
    match existing {
        Some(k) => {
            map.insert(k, value);
        }
        None => {
            map.insert(Value::String(key.to_string()), value);
        }
    }
}

/// Remove `key` from a mapping while preserving the order of the rest.
pub fn remove_key(map: &mut Mapping, key: &str) -> Option<Value> {
    let existing = map
        .iter()
        .find(|(k, _)| key_text(k) == key)
        .map(|(k, _)| k.clone())?;
    map.shift_remove(&existing)
}

/// Number of children in a collection; `None` for scalars.
pub fn length(value: &Value) -> Option<usize> {
    match untag(value) {
        Value::Sequence(items) => Some(items.len()),
        Value::Mapping(map) => Some(map.len()),
        _ => None,
    }
}
