//! Validator configuration, loadable from YAML or JSON.

use crate::error::{Result, WardenError};
use crate::source;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// ```yaml
/// allow_unknown: false
/// purge_unknown: false
/// require_all: false
/// schema_validation: true
/// max_depth: 64
/// registry:
///   address:
///     city: { type: string, required: true }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    pub allow_unknown: bool,
    pub purge_unknown: bool,
    pub require_all: bool,
    /// Check user schemas against the schema-of-schemas before use.
    pub schema_validation: bool,
    /// Deepest allowed nesting of rule-set applications.
    pub max_depth: usize,
    /// Named schemas, referenced from `schema:` rules by name.
    pub registry: BTreeMap<String, Value>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            allow_unknown: false,
            purge_unknown: false,
            require_all: false,
            schema_validation: true,
            max_depth: DEFAULT_MAX_DEPTH,
            registry: BTreeMap::new(),
        }
    }
}

impl ValidatorConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: ValidatorConfig = serde_yaml::from_value(value)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::from_value(source::parse_yaml_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_value(source::load_file(path)?)
    }

    fn check(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(WardenError::Config("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ValidatorConfig::default());
        assert!(config.schema_validation);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_partial_config() {
        let config = ValidatorConfig::from_yaml_str(
            "purge_unknown: true\nregistry:\n  user:\n    name: {type: string}\n",
        )
        .unwrap();
        assert!(config.purge_unknown);
        assert!(!config.allow_unknown);
        assert!(config.registry.contains_key("user"));
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(ValidatorConfig::from_yaml_str("max_depth: 0").is_err());
        assert!(ValidatorConfig::from_yaml_str("allow_unkown: true").is_err());
    }
}
