//! The six-field combination a decision is made for.

use crate::domain::blueprint::{Blueprint, EnumerationEntry};
use crate::domain::error::ReentryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Combination fields, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Symbol,
    SignalType,
    TimeCategory,
    Outcome,
    Context,
    Generation,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Symbol,
        Field::SignalType,
        Field::TimeCategory,
        Field::Outcome,
        Field::Context,
        Field::Generation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Symbol => "symbol",
            Field::SignalType => "signal_type",
            Field::TimeCategory => "time_category",
            Field::Outcome => "outcome",
            Field::Context => "context",
            Field::Generation => "generation",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Field::Outcome | Field::Generation)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown combination field '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub symbol: String,
    pub signal_type: String,
    pub time_category: String,
    pub outcome: i64,
    pub context: String,
    pub generation: i64,
}

impl Combination {
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::Symbol => Value::from(self.symbol.as_str()),
            Field::SignalType => Value::from(self.signal_type.as_str()),
            Field::TimeCategory => Value::from(self.time_category.as_str()),
            Field::Outcome => Value::from(self.outcome),
            Field::Context => Value::from(self.context.as_str()),
            Field::Generation => Value::from(self.generation),
        }
    }

    /// Field name to value map, in canonical order.
    pub fn to_fields(&self) -> Map<String, Value> {
        Field::ALL
            .into_iter()
            .map(|field| (field.as_str().to_string(), self.get(field)))
            .collect()
    }

    /// Build a combination from a field map, as produced by the identifier codec.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, ReentryError> {
        let text = |field: Field| -> Result<String, ReentryError> {
            match fields.get(field.as_str()) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(ReentryError::format(format!(
                    "field '{}' must be a string, got {}",
                    field, other
                ))),
                None => Err(ReentryError::format(format!("missing field '{}'", field))),
            }
        };
        let integer = |field: Field| -> Result<i64, ReentryError> {
            let value = fields
                .get(field.as_str())
                .ok_or_else(|| ReentryError::format(format!("missing field '{}'", field)))?;
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse::<i64>().ok(),
                _ => None,
            };
            parsed.ok_or_else(|| {
                ReentryError::format(format!(
                    "field '{}' must be an integer, got {}",
                    field, value
                ))
            })
        };

        Ok(Self {
            symbol: text(Field::Symbol)?,
            signal_type: text(Field::SignalType)?,
            time_category: text(Field::TimeCategory)?,
            outcome: integer(Field::Outcome)?,
            context: text(Field::Context)?,
            generation: integer(Field::Generation)?,
        })
    }
}

/// Check a combination against the blueprint's enumerations.
///
/// The rule engine trusts its input; this is the check callers run first.
/// Enumerations the blueprint does not declare are not checked.
pub fn validate_combination(bp: &Blueprint, combo: &Combination) -> Result<(), ReentryError> {
    for field in Field::ALL {
        let Some(entry) = bp.enumeration(field.as_str()) else {
            continue;
        };
        let value = combo.get(field);
        match entry {
            EnumerationEntry::Allowed(allowed) => {
                if !allowed.iter().any(|candidate| loosely_equal(candidate, &value)) {
                    return Err(invalid(field, format!("{} is not an allowed value", value)));
                }
            }
            EnumerationEntry::Range { min, max } => {
                let n = value.as_f64().unwrap_or(f64::NAN);
                if !(n >= min && n <= max) {
                    return Err(invalid(
                        field,
                        format!("{} out of range [{}, {}]", value, min, max),
                    ));
                }
            }
            EnumerationEntry::Pattern(pattern) => {
                let anchored = format!("^(?:{})", pattern);
                let re = Regex::new(&anchored).map_err(|e| ReentryError::Validation {
                    violations: vec![format!("enumerations.{}.pattern: {}", field, e)],
                })?;
                let text = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !re.is_match(&text) {
                    return Err(invalid(
                        field,
                        format!("'{}' does not match pattern {}", text, pattern),
                    ));
                }
            }
            EnumerationEntry::Table(_) => {}
        }
    }
    Ok(())
}

// Allowed lists in YAML often spell integers as strings or floats.
fn loosely_equal(candidate: &Value, value: &Value) -> bool {
    match (candidate, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::Number(b)) | (Value::Number(b), Value::String(a)) => {
            a.parse::<f64>().ok() == b.as_f64()
        }
        _ => candidate == value,
    }
}

fn invalid(field: Field, reason: String) -> ReentryError {
    ReentryError::InvalidCombination {
        field: field.to_string(),
        reason,
    }
}
