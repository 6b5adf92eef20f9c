//! Type registry: named types that rules use to coerce and compare values.

use crate::node::untag;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_yaml::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Coercion from a document node into a native Rust value.
pub trait FromNode: Sized {
    fn from_node(node: &Value) -> Option<Self>;
}

impl FromNode for i64 {
    fn from_node(node: &Value) -> Option<Self> {
        match untag(node) {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

impl FromNode for f64 {
    fn from_node(node: &Value) -> Option<Self> {
        match untag(node) {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

impl FromNode for String {
    fn from_node(node: &Value) -> Option<Self> {
        match untag(node) {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromNode for bool {
    fn from_node(node: &Value) -> Option<Self> {
        match untag(node) {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromNode for NaiveDate {
    fn from_node(node: &Value) -> Option<Self> {
        match untag(node) {
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }
}

impl FromNode for DateTime<FixedOffset> {
    fn from_node(node: &Value) -> Option<Self> {
        match untag(node) {
            Value::String(s) => DateTime::parse_from_rfc3339(s).ok(),
            _ => None,
        }
    }
}

/// Behaviour of a named type. `equal` and `less` are only meaningful
/// when both operands pass `is_convertible`; they return `false` otherwise.
pub trait TypeDescriptor: Send + Sync {
    fn is_convertible(&self, node: &Value) -> bool;
    fn equal(&self, a: &Value, b: &Value) -> bool;
    fn less(&self, a: &Value, b: &Value) -> bool;
}

/// A type descriptor backed by a native Rust type.
pub struct NativeType<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NativeType<T> {
    pub fn new() -> Self {
        NativeType {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for NativeType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeDescriptor for NativeType<T>
where
    T: FromNode + PartialOrd,
{
    fn is_convertible(&self, node: &Value) -> bool {
        T::from_node(node).is_some()
    }

    fn equal(&self, a: &Value, b: &Value) -> bool {
        match (T::from_node(a), T::from_node(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn less(&self, a: &Value, b: &Value) -> bool {
        match (T::from_node(a), T::from_node(b)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

/// Name-keyed registry of type descriptors.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<dyn TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_native::<i64>("integer");
        registry.register_native::<String>("string");
        registry.register_native::<f64>("float");
        registry.register_native::<f64>("number");
        registry.register_native::<bool>("boolean");
        registry.register_native::<NaiveDate>("date");
        registry.register_native::<DateTime<FixedOffset>>("datetime");
        registry
    }

    /// Register a descriptor, replacing any previous entry of that name.
    pub fn register(&mut self, name: impl Into<String>, descriptor: Arc<dyn TypeDescriptor>) {
        self.types.insert(name.into(), descriptor);
    }

    pub fn register_native<T>(&mut self, name: impl Into<String>)
    where
        T: FromNode + PartialOrd + 'static,
    {
        self.register(name, Arc::new(NativeType::<T>::new()));
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn TypeDescriptor>> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_builtin_integer() {
        let registry = TypeRegistry::with_builtins();
        let integer = registry.lookup("integer").unwrap();
        assert!(integer.is_convertible(&yaml("42")));
        assert!(!integer.is_convertible(&yaml("4.2")));
        assert!(!integer.is_convertible(&yaml("'42'")));
        assert!(integer.less(&yaml("1"), &yaml("2")));
        assert!(integer.equal(&yaml("7"), &yaml("7")));
    }

    #[test]
    fn test_number_is_float_alias() {
        let registry = TypeRegistry::with_builtins();
        let number = registry.lookup("number").unwrap();
        assert!(number.is_convertible(&yaml("3")));
        assert!(number.is_convertible(&yaml("3.5")));
        assert!(number.less(&yaml("3"), &yaml("3.5")));
    }

    #[test]
    fn test_string_and_boolean_are_strict() {
        let registry = TypeRegistry::with_builtins();
        assert!(!registry.lookup("string").unwrap().is_convertible(&yaml("42")));
        assert!(!registry.lookup("boolean").unwrap().is_convertible(&yaml("yes")));
        assert!(registry.lookup("boolean").unwrap().is_convertible(&yaml("false")));
    }

    #[test]
    fn test_dates() {
        let registry = TypeRegistry::with_builtins();
        let date = registry.lookup("date").unwrap();
        assert!(date.is_convertible(&yaml("'2024-02-29'")));
        assert!(!date.is_convertible(&yaml("'2023-02-29'")));
        assert!(date.less(&yaml("'1984-01-01'"), &yaml("'2001-06-30'")));

        let datetime = registry.lookup("datetime").unwrap();
        assert!(datetime.is_convertible(&yaml("'2001-06-30T12:00:00+02:00'")));
        assert!(datetime.equal(
            &yaml("'2001-06-30T12:00:00+02:00'"),
            &yaml("'2001-06-30T10:00:00Z'")
        ));
    }

    #[test]
    fn test_comparisons_fail_closed() {
        let registry = TypeRegistry::with_builtins();
        let integer = registry.lookup("integer").unwrap();
        assert!(!integer.equal(&yaml("1"), &yaml("one")));
        assert!(!integer.less(&yaml("one"), &yaml("2")));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register_native::<String>("integer");
        assert!(registry.lookup("integer").unwrap().is_convertible(&yaml("abc")));
        assert!(registry.lookup("nosuch").is_none());
    }
}
