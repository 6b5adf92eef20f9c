//! Table-driven tests over the YAML case files in `tests/data/`.
//!
//! `cases.yaml` holds one entry per behaviour: a schema, validator
//! settings, and documents expected to pass or fail. `malformed_schemas.yaml`
//! lists schemas that must be rejected outright.

use pretty_assertions::assert_eq;
use serde_yaml::Value;
use warden::{source, Validator, ValidatorConfig, WardenError};

const CASES: &str = include_str!("data/cases.yaml");
const MALFORMED: &str = include_str!("data/malformed_schemas.yaml");

/// Helper to build the validator a case asks for
fn validator_for(case: &Value) -> Validator {
    let flag = |key: &str| case.get(key).and_then(Value::as_bool).unwrap_or(false);
    let mut validator = Validator::with_schema(case["schema"].clone());
    validator.set_allow_unknown(flag("allow_unknown"));
    validator.set_purge_unknown(flag("purge_unknown"));
    validator.set_require_all(flag("require_all"));
    if let Some(Value::Mapping(registry)) = case.get("registry") {
        for (name, schema) in registry {
            validator.register_schema(name.as_str().unwrap(), schema.clone());
        }
    }
    validator
}

fn documents<'a>(case: &'a Value, key: &str) -> &'a [Value] {
    case.get(key)
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[test]
fn test_validation_cases() {
    let cases: Value = source::parse_yaml_str(CASES).unwrap();
    let mut failures = Vec::new();

    for (name, case) in cases.as_mapping().unwrap() {
        let name = name.as_str().unwrap();
        let mut validator = validator_for(case);

        for document in documents(case, "success") {
            match validator.validate(document) {
                Ok(true) => {}
                Ok(false) => failures.push(format!(
                    "{name}: expected {document:?} to pass, got {:?}",
                    validator.errors()
                )),
                Err(e) => failures.push(format!("{name}: schema error on {document:?}: {e}")),
            }
        }
        for document in documents(case, "failure") {
            match validator.validate(document) {
                Ok(false) => assert!(!validator.errors().is_empty()),
                Ok(true) => failures.push(format!("{name}: expected {document:?} to fail")),
                Err(e) => failures.push(format!("{name}: schema error on {document:?}: {e}")),
            }
        }
        // Normalized output must come back unchanged from a second pass.
        for pair in documents(case, "normalized") {
            let expected = &pair["output"];
            for input in [&pair["input"], expected] {
                match validator.validate(input) {
                    Ok(true) if validator.document() == expected => {}
                    Ok(true) => failures.push(format!(
                        "{name}: {input:?} normalized to {:?}, expected {expected:?}",
                        validator.document()
                    )),
                    other => failures.push(format!("{name}: {input:?} did not validate: {other:?}")),
                }
            }
        }
    }

    assert!(failures.is_empty(), "\n{}", failures.join("\n"));
}

#[test]
fn test_malformed_schemas() {
    let schemas: Value = source::parse_yaml_str(MALFORMED).unwrap();
    let mut accepted = Vec::new();

    for (name, schema) in schemas.as_mapping().unwrap() {
        let mut validator = Validator::new();
        match validator.validate_with(&Value::Null, schema) {
            Err(WardenError::Schema(_)) => assert!(validator.errors().is_empty()),
            other => accepted.push(format!("{}: {other:?}", name.as_str().unwrap())),
        }
    }

    assert!(accepted.is_empty(), "schemas not rejected:\n{}", accepted.join("\n"));
}

#[test]
fn test_malformed_named_sub_schemas() {
    let uses = [
        "sub: {type: dict, schema: broken}",
        "items: {type: list, schema: broken_rules}",
        "pair: {type: list, items: [broken_rules]}",
        "m: {type: dict, valuesrules: broken_rules}",
    ];
    let document = source::parse_yaml_str("{sub: {n: 1}, items: [1], pair: [1], m: {k: 1}}").unwrap();

    for schema in uses {
        let mut validator = Validator::with_schema(source::parse_yaml_str(schema).unwrap());
        validator.set_allow_unknown(true);
        validator.register_schema("broken", source::parse_yaml_str("n: {frobnicate: 1}").unwrap());
        validator.register_schema(
            "broken_rules",
            source::parse_yaml_str("{type: integer, required: notabool}").unwrap(),
        );
        let err = validator.validate(&document).unwrap_err();
        assert!(err.is_schema_error(), "{schema}: {err}");
    }
}

#[test]
fn test_exactly_one_error_per_bad_element() {
    let schema = source::parse_yaml_str("items: {type: list, schema: {type: integer, min: 0}}").unwrap();
    let mut validator = Validator::with_schema(schema);
    let document = source::parse_yaml_str("items: [1, 2, -1, 4]").unwrap();

    assert!(!validator.validate(&document).unwrap());
    let paths: Vec<&str> = validator.errors().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["^items[2]"]);
}

#[test]
fn test_normalized_output_revalidates_unchanged() {
    let schema = source::parse_yaml_str(
        r#"
title: {type: string, default: untitled}
author: {type: string, rename: by}
tags:
  type: list
  default: []
  schema: {type: string}
pages:
  type: list
  schema:
    type: dict
    purge_unknown: true
    schema:
      number: {type: integer, min: 0}
      kind: {type: string, default: body, allowed: [cover, body]}
"#,
    )
    .unwrap();
    let document = source::parse_yaml_str(
        "author: Ada\npages:\n  - {number: 1, kind: cover, draft: true}\n  - {number: 2}\n",
    )
    .unwrap();

    let mut validator = Validator::with_schema(schema);
    assert!(validator.validate(&document).unwrap(), "{:?}", validator.errors());
    let normalized = validator.document().clone();
    assert_eq!(
        normalized,
        source::parse_yaml_str(
            "title: untitled\nby: Ada\ntags: []\npages:\n  - {number: 1, kind: cover}\n  - {number: 2, kind: body}\n",
        )
        .unwrap()
    );

    assert!(validator.validate(&normalized).unwrap());
    assert_eq!(validator.document(), &normalized);
}

#[test]
fn test_json_documents() {
    let schema = source::parse_json_str(r#"{"id": {"type": "integer", "required": true}}"#).unwrap();
    let mut validator = Validator::with_schema(schema);
    assert!(validator.validate(&source::parse_json_str(r#"{"id": 7}"#).unwrap()).unwrap());
    assert!(!validator.validate(&source::parse_json_str(r#"{"id": "7"}"#).unwrap()).unwrap());
}

#[test]
fn test_files_and_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let schema_path = dir.path().join("schema.yaml");
    let config_path = dir.path().join("config.json");
    std::fs::write(&schema_path, "order:\n  type: dict\n  schema: line\n").unwrap();
    std::fs::write(
        &config_path,
        r#"{"purge_unknown": true, "registry": {"line": {"sku": {"type": "string", "required": true}}}}"#,
    )
    .unwrap();

    let schema = source::load_file(&schema_path).unwrap();
    let config = ValidatorConfig::from_file(&config_path).unwrap();
    let mut validator = Validator::from_config(schema, config);

    let document = source::parse_yaml_str("order: {sku: A-1, note: rush}\nstray: 1\n").unwrap();
    assert!(validator.validate(&document).unwrap());
    assert_eq!(validator.document(), &source::parse_yaml_str("order: {sku: A-1}").unwrap());

    assert!(!validator.validate(&source::parse_yaml_str("order: {}").unwrap()).unwrap());
    assert_eq!(validator.errors()[0].path, "^order.sku");
}
