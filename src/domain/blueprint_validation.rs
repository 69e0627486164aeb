//! Blueprint validation.
//!
//! One deterministic policy: the structural checks below always run, and when
//! a schema document is supplied the blueprint is checked against it as well.
//! The schema checker implements the JSON-Schema validation keywords listed in
//! [`VALIDATION_KEYWORDS`]; annotation keywords are ignored. A schema using any
//! other keyword (`$ref`, `patternProperties`, `if`, ...) is itself reported as
//! a violation instead of being silently skipped. Every violation is collected
//! and reported together.

use crate::domain::blueprint::{Blueprint, COORDINATE_COUNT, REQUIRED_SECTIONS};
use crate::domain::error::ReentryError;
use crate::domain::value_ops::values_equal;
use regex::Regex;
use serde_json::{Map, Value};

pub fn validate_blueprint(bp: &Blueprint, schema: Option<&Value>) -> Result<(), ReentryError> {
    let mut violations = Vec::new();
    validate_required_sections(bp, &mut violations);
    validate_coordinate_order(bp, &mut violations);
    if let Some(schema) = schema {
        check_schema_keywords(schema, "#", &mut violations);
        validate_against_schema(bp.document(), schema, "$", &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ReentryError::Validation { violations })
    }
}

fn validate_required_sections(bp: &Blueprint, violations: &mut Vec<String>) {
    let missing: Vec<&str> = REQUIRED_SECTIONS
        .into_iter()
        .filter(|key| bp.document().get(*key).is_none())
        .collect();
    if !missing.is_empty() {
        violations.push(format!(
            "blueprint missing top-level keys: {}",
            missing.join(", ")
        ));
    }
}

fn validate_coordinate_order(bp: &Blueprint, violations: &mut Vec<String>) {
    if bp.document().get("conventions").is_none() {
        return;
    }
    match bp.conventions().get("canonical_coordinate_order") {
        None => violations.push("conventions.canonical_coordinate_order is required".to_string()),
        Some(Value::Array(items)) if items.len() == COORDINATE_COUNT => {}
        Some(Value::Array(items)) => violations.push(format!(
            "conventions.canonical_coordinate_order must have exactly {} elements, found {}",
            COORDINATE_COUNT,
            items.len()
        )),
        Some(_) => violations
            .push("conventions.canonical_coordinate_order must be a list".to_string()),
    }
}

/// Keywords the schema checker enforces.
pub const VALIDATION_KEYWORDS: [&str; 24] = [
    "type",
    "enum",
    "const",
    "required",
    "properties",
    "additionalProperties",
    "minProperties",
    "maxProperties",
    "items",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minLength",
    "maxLength",
    "pattern",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
];

const ANNOTATION_KEYWORDS: [&str; 11] = [
    "$schema",
    "$id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "format",
    "readOnly",
    "writeOnly",
    "deprecated",
];

const TYPE_NAMES: [&str; 7] = ["object", "array", "string", "boolean", "null", "number", "integer"];

/// Walk every subschema and report keywords the checker cannot enforce.
fn check_schema_keywords(schema: &Value, path: &str, violations: &mut Vec<String>) {
    let schema = match schema {
        Value::Bool(_) => return,
        Value::Object(map) => map,
        other => {
            violations.push(format!("schema {}: expected an object or boolean, found {}", path, other));
            return;
        }
    };

    for (keyword, value) in schema {
        let keyword = keyword.as_str();
        if ANNOTATION_KEYWORDS.contains(&keyword) {
            continue;
        }
        if !VALIDATION_KEYWORDS.contains(&keyword) {
            violations.push(format!("schema {}: unsupported keyword '{}'", path, keyword));
            continue;
        }
        let sub_path = format!("{}/{}", path, keyword);
        match (keyword, value) {
            ("properties", Value::Object(properties)) => {
                for (name, sub_schema) in properties {
                    check_schema_keywords(sub_schema, &format!("{}/{}", sub_path, name), violations);
                }
            }
            ("items", Value::Array(_)) => violations.push(format!(
                "schema {}: tuple-form 'items' is not supported",
                sub_path
            )),
            ("items" | "additionalProperties" | "not", sub_schema) => {
                check_schema_keywords(sub_schema, &sub_path, violations);
            }
            ("allOf" | "anyOf" | "oneOf", Value::Array(branches)) => {
                for (i, branch) in branches.iter().enumerate() {
                    check_schema_keywords(branch, &format!("{}/{}", sub_path, i), violations);
                }
            }
            ("properties" | "allOf" | "anyOf" | "oneOf", other) => violations.push(format!(
                "schema {}: expected {}, found {}",
                sub_path,
                if keyword == "properties" { "an object" } else { "a list" },
                other
            )),
            ("minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" | "multipleOf", value)
                if !value.is_number() =>
            {
                violations.push(format!("schema {}: expected a number, found {}", sub_path, value))
            }
            (
                "minItems" | "maxItems" | "minLength" | "maxLength" | "minProperties"
                | "maxProperties",
                value,
            ) if value.as_u64().is_none() => violations.push(format!(
                "schema {}: expected a non-negative integer, found {}",
                sub_path, value
            )),
            ("required" | "enum", value) if !value.is_array() => {
                violations.push(format!("schema {}: expected a list, found {}", sub_path, value))
            }
            ("uniqueItems", value) if !value.is_boolean() => {
                violations.push(format!("schema {}: expected a boolean, found {}", sub_path, value))
            }
            ("pattern", value) if !value.is_string() => {
                violations.push(format!("schema {}: expected a string, found {}", sub_path, value))
            }
            ("type", expected) => {
                let names: Vec<&Value> = match expected {
                    Value::Array(names) => names.iter().collect(),
                    single => vec![single],
                };
                for name in names {
                    if !name.as_str().is_some_and(|n| TYPE_NAMES.contains(&n)) {
                        violations.push(format!("schema {}: unknown type {}", sub_path, name));
                    }
                }
            }
            ("pattern", Value::String(pattern)) => {
                if let Err(e) = Regex::new(pattern) {
                    violations.push(format!("schema {}: invalid pattern: {}", sub_path, e));
                }
            }
            _ => {}
        }
    }
}

fn validate_against_schema(
    instance: &Value,
    schema: &Value,
    path: &str,
    violations: &mut Vec<String>,
) {
    let schema = match schema {
        Value::Bool(true) => return,
        Value::Bool(false) => {
            violations.push(format!("{}: no value is allowed here", path));
            return;
        }
        Value::Object(map) => map,
        _ => return,
    };

    if let Some(expected) = schema.get("type") {
        let matches = match expected {
            Value::String(name) => type_matches(instance, name),
            Value::Array(names) => names
                .iter()
                .filter_map(Value::as_str)
                .any(|name| type_matches(instance, name)),
            _ => true,
        };
        if !matches {
            violations.push(format!("{}: expected type {}", path, expected));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.iter().any(|candidate| values_equal(candidate, instance)) {
            violations.push(format!(
                "{}: {} is not one of {}",
                path,
                instance,
                Value::Array(allowed.clone())
            ));
        }
    }
    if let Some(expected) = schema.get("const") {
        if !values_equal(expected, instance) {
            violations.push(format!("{}: expected {}, found {}", path, expected, instance));
        }
    }

    match instance {
        Value::Object(object) => validate_object(object, schema, path, violations),
        Value::Array(items) => validate_array(items, schema, path, violations),
        Value::String(text) => validate_string(text, schema, path, violations),
        Value::Number(_) => validate_number(instance, schema, path, violations),
        _ => {}
    }

    validate_combinators(instance, schema, path, violations);
}

fn validate_object(
    object: &Map<String, Value>,
    schema: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<String>,
) {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                violations.push(format!("{}: missing required key '{}'", path, key));
            }
        }
    }
    let properties = schema.get("properties").and_then(Value::as_object);
    if let Some(properties) = properties {
        for (key, sub_schema) in properties {
            if let Some(value) = object.get(key) {
                validate_against_schema(value, sub_schema, &format!("{}.{}", path, key), violations);
            }
        }
    }
    if let Some(additional) = schema.get("additionalProperties") {
        for (key, value) in object {
            if properties.is_some_and(|p| p.contains_key(key)) {
                continue;
            }
            let sub_path = format!("{}.{}", path, key);
            if additional == &Value::Bool(false) {
                violations.push(format!("{}: additional property is not allowed", sub_path));
            } else {
                validate_against_schema(value, additional, &sub_path, violations);
            }
        }
    }
    if let Some(min) = schema.get("minProperties").and_then(Value::as_u64) {
        if (object.len() as u64) < min {
            violations.push(format!(
                "{}: expected at least {} properties, found {}",
                path,
                min,
                object.len()
            ));
        }
    }
    if let Some(max) = schema.get("maxProperties").and_then(Value::as_u64) {
        if (object.len() as u64) > max {
            violations.push(format!(
                "{}: expected at most {} properties, found {}",
                path,
                max,
                object.len()
            ));
        }
    }
}

fn validate_array(
    items: &[Value],
    schema: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<String>,
) {
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            violations.push(format!(
                "{}: expected at least {} items, found {}",
                path,
                min,
                items.len()
            ));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            violations.push(format!(
                "{}: expected at most {} items, found {}",
                path,
                max,
                items.len()
            ));
        }
    }
    if schema.get("uniqueItems") == Some(&Value::Bool(true)) {
        let duplicate = items.iter().enumerate().find(|(i, item)| {
            items[..*i].iter().any(|earlier| values_equal(earlier, item))
        });
        if let Some((i, _)) = duplicate {
            violations.push(format!("{}[{}]: duplicate item", path, i));
        }
    }
    if let Some(item_schema) = schema.get("items").filter(|s| !s.is_array()) {
        for (i, item) in items.iter().enumerate() {
            validate_against_schema(item, item_schema, &format!("{}[{}]", path, i), violations);
        }
    }
}

fn validate_string(text: &str, schema: &Map<String, Value>, path: &str, violations: &mut Vec<String>) {
    let length = text.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if length < min {
            violations.push(format!("{}: expected at least {} characters, found {}", path, min, length));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if length > max {
            violations.push(format!("{}: expected at most {} characters, found {}", path, max, length));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        // Invalid patterns are reported by the keyword pass.
        if let Ok(re) = Regex::new(pattern) {
            if !re.is_match(text) {
                violations.push(format!("{}: '{}' does not match pattern {}", path, text, pattern));
            }
        }
    }
}

fn validate_number(instance: &Value, schema: &Map<String, Value>, path: &str, violations: &mut Vec<String>) {
    let Some(n) = instance.as_f64() else {
        return;
    };
    let bound = |keyword: &str| schema.get(keyword).and_then(Value::as_f64);
    let checks: [(&str, fn(f64, f64) -> bool, &str); 4] = [
        ("minimum", |n, b| n >= b, ">="),
        ("maximum", |n, b| n <= b, "<="),
        ("exclusiveMinimum", |n, b| n > b, ">"),
        ("exclusiveMaximum", |n, b| n < b, "<"),
    ];
    for (keyword, holds, symbol) in checks {
        if let Some(b) = bound(keyword) {
            if !holds(n, b) {
                violations.push(format!("{}: {} must be {} {}", path, instance, symbol, b));
            }
        }
    }
    if let Some(step) = bound("multipleOf").filter(|s| *s > 0.0) {
        let quotient = n / step;
        if (quotient - quotient.round()).abs() > 1e-9 {
            violations.push(format!("{}: {} is not a multiple of {}", path, instance, step));
        }
    }
}

fn validate_combinators(
    instance: &Value,
    schema: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<String>,
) {
    let passes = |sub_schema: &Value| -> bool {
        let mut scratch = Vec::new();
        validate_against_schema(instance, sub_schema, path, &mut scratch);
        scratch.is_empty()
    };

    if let Some(branches) = schema.get("allOf").and_then(Value::as_array) {
        for branch in branches {
            validate_against_schema(instance, branch, path, violations);
        }
    }
    if let Some(branches) = schema.get("anyOf").and_then(Value::as_array) {
        if !branches.iter().any(|branch| passes(branch)) {
            violations.push(format!("{}: does not match any schema in anyOf", path));
        }
    }
    if let Some(branches) = schema.get("oneOf").and_then(Value::as_array) {
        let matched = branches.iter().filter(|&branch| passes(branch)).count();
        if matched != 1 {
            violations.push(format!(
                "{}: must match exactly one schema in oneOf, matched {}",
                path, matched
            ));
        }
    }
    if let Some(negated) = schema.get("not") {
        if passes(negated) {
            violations.push(format!("{}: must not match the schema in not", path));
        }
    }
}

fn type_matches(instance: &Value, name: &str) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => {
            instance.is_i64()
                || instance.is_u64()
                || instance.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => true,
    }
}
