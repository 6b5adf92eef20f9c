use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single problem found while validating a document.
///
/// `path` is root-relative, e.g. `^user.addresses[0].city`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrorItem {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error validating data field {}: {}", self.path, self.message)
    }
}

/// Fatal problems with the schema itself. These abort `validate`
/// immediately and are never mixed into the collected error list.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Malformed rules for field '{field}':\n  - {}", join_items(.errors))]
    Malformed {
        field: String,
        errors: Vec<ValidationErrorItem>,
    },

    #[error("Schema must be a mapping of field names to rules")]
    NotAMapping,

    #[error("Unknown schema '{0}' (was it registered?)")]
    UnknownSchema(String),

    #[error("Recursion limit of {limit} exceeded at {path}")]
    RecursionLimit { limit: usize, path: String },
}

impl SchemaError {
    /// The collected schema-of-schemas errors, if this is a bootstrap failure.
    pub fn errors(&self) -> &[ValidationErrorItem] {
        match self {
            SchemaError::Malformed { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn join_items(items: &[ValidationErrorItem]) -> String {
    items
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("\n  - ")
}

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WardenError {
    pub fn is_schema_error(&self) -> bool {
        matches!(self, WardenError::Schema(_))
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
