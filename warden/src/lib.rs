//! Schema-driven validation and normalization of YAML/JSON document trees.
//!
//! A schema maps field names to rule-sets such as
//! `{type: integer, min: 0, default: 1}`. Validation checks a document
//! against it, normalizes the document on the way (defaults, renames,
//! purging unknown fields) and collects every problem with its path
//! instead of stopping at the first one.

mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod rules;
pub mod source;
pub mod stack;
pub mod types;
pub mod validator;

pub use config::ValidatorConfig;
pub use context::{Policy, SchemaShape, ValidationContext};
pub use error::{Result, SchemaError, ValidationErrorItem, WardenError};
pub use rules::RulePriority;
pub use types::{FromNode, NativeType, TypeDescriptor};
pub use validator::Validator;
