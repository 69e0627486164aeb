//! Blueprint configuration model.
//!
//! A [`Blueprint`] wraps the parsed document tree. It is an immutable value:
//! callers load it once and pass references into the codec, resolver and
//! rule engine.

use crate::domain::error::ReentryError;
use serde_json::Value;

/// Top-level sections every blueprint must declare.
pub const REQUIRED_SECTIONS: [&str; 6] = [
    "schema_version",
    "conventions",
    "enumerations",
    "persistence",
    "rules",
    "ui_requirements",
];

/// Number of entries in `conventions.canonical_coordinate_order`.
pub const COORDINATE_COUNT: usize = 6;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    document: Value,
}

/// Typed view over one entry of the `enumerations` section.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumerationEntry<'a> {
    Allowed(&'a [Value]),
    Range { min: f64, max: f64 },
    Pattern(&'a str),
    /// Anything else: a lookup table addressed from formulas.
    Table(&'a Value),
}

impl Blueprint {
    pub fn from_value(document: Value) -> Self {
        Self { document }
    }

    /// Parse a document from text. JSON is tried first, then YAML.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ReentryError> {
        let document = parse_document(text, origin)?;
        if !document.is_object() {
            return Err(ReentryError::DocumentParse {
                path: origin.to_string(),
                reason: "document root must be a mapping".to_string(),
            });
        }
        Ok(Self { document })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_value(self) -> Value {
        self.document
    }

    /// Returns the named top-level section, or `null` when absent.
    pub fn section(&self, name: &str) -> &Value {
        self.document.get(name).unwrap_or(&NULL)
    }

    pub fn schema_version(&self) -> Option<String> {
        match self.document.get("schema_version")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn conventions(&self) -> &Value {
        self.section("conventions")
    }

    pub fn enumerations(&self) -> &Value {
        self.section("enumerations")
    }

    pub fn defaults(&self) -> &Value {
        self.section("defaults")
    }

    pub fn rules(&self) -> &Value {
        self.section("rules")
    }

    pub fn ui_requirements(&self) -> &Value {
        self.section("ui_requirements")
    }

    pub fn canonical_coordinate_order(&self) -> Vec<&str> {
        self.conventions()
            .get("canonical_coordinate_order")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Follow a dot-separated path from the document root.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.document, path)
    }

    pub fn enumeration(&self, name: &str) -> Option<EnumerationEntry<'_>> {
        let entry = self.enumerations().get(name)?;
        if let Some(allowed) = entry.get("allowed").and_then(Value::as_array) {
            return Some(EnumerationEntry::Allowed(allowed));
        }
        if let Some(range) = entry.get("range") {
            let min = range.get("min").and_then(Value::as_f64);
            let max = range.get("max").and_then(Value::as_f64);
            if let (Some(min), Some(max)) = (min, max) {
                return Some(EnumerationEntry::Range { min, max });
            }
        }
        if let Some(pattern) = entry.get("pattern").and_then(Value::as_str) {
            return Some(EnumerationEntry::Pattern(pattern));
        }
        Some(EnumerationEntry::Table(entry))
    }
}

/// Follow a dot-separated path through objects (by key) and arrays (by index).
pub fn lookup_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(root, |current, segment| child(current, segment))
}

pub(crate) fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Parse document text, trying JSON before falling back to YAML.
pub fn parse_document(text: &str, origin: &str) -> Result<Value, ReentryError> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(json_err) => {
            tracing::debug!(origin, error = %json_err, "document is not JSON, trying YAML");
            parse_yaml(text, origin)
        }
    }
}

#[cfg(feature = "yaml")]
fn parse_yaml(text: &str, origin: &str) -> Result<Value, ReentryError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ReentryError::DocumentParse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
    Ok(yaml_to_json(yaml))
}

#[cfg(not(feature = "yaml"))]
fn parse_yaml(_text: &str, origin: &str) -> Result<Value, ReentryError> {
    Err(ReentryError::DocumentParse {
        path: origin.to_string(),
        reason: "not valid JSON and YAML support is disabled".to_string(),
    })
}

// Mapping keys become strings so integer-keyed lookup tables stay addressable.
#[cfg(feature = "yaml")]
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => {
            let tagged = *tagged;
            yaml_to_json(tagged.value)
        }
    }
}

#[cfg(feature = "yaml")]
fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;
    match key {
        Yaml::String(s) => s,
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        other => yaml_to_json(other).to_string(),
    }
}
