//! Symbolic value resolution for rule outputs.
//!
//! Output values may be literals, configuration references (`$ref.a.b.c`) or
//! formulas (`$calc:<expression>`). Condition literals are never resolved.

use crate::domain::blueprint::{Blueprint, child};
use crate::domain::combination::{Combination, Field};
use crate::domain::error::ReentryError;
use crate::domain::formula::{self, Bindings};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const REF_MARKER: &str = "$ref.";
pub const CALC_MARKER: &str = "$calc:";

static ENUM_SUBSCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"enumerations\.([A-Za-z_]+)\.([A-Za-z_]+)\[([A-Za-z_]+)\]")
        .expect("enumeration subscript pattern is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct ExpressionResolver<'a> {
    blueprint: &'a Blueprint,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(blueprint: &'a Blueprint) -> Self {
        Self { blueprint }
    }

    pub fn resolve(&self, value: &Value, combo: &Combination) -> Result<Value, ReentryError> {
        if let Value::String(s) = value {
            if let Some(path) = s.strip_prefix(REF_MARKER) {
                return self.resolve_reference(path);
            }
            if let Some(expression) = s.strip_prefix(CALC_MARKER) {
                return self.resolve_formula(expression, combo);
            }
        }
        Ok(value.clone())
    }

    pub fn resolve_map(
        &self,
        map: &Map<String, Value>,
        combo: &Combination,
    ) -> Result<Map<String, Value>, ReentryError> {
        let mut resolved = Map::with_capacity(map.len());
        for (key, value) in map {
            resolved.insert(key.clone(), self.resolve(value, combo)?);
        }
        Ok(resolved)
    }

    fn resolve_reference(&self, path: &str) -> Result<Value, ReentryError> {
        self.blueprint
            .lookup(path)
            .cloned()
            .ok_or_else(|| ReentryError::Reference {
                path: path.to_string(),
            })
    }

    fn resolve_formula(&self, expression: &str, combo: &Combination) -> Result<Value, ReentryError> {
        let rewritten = self.rewrite_subscripts(expression, combo)?;
        let bindings = Bindings {
            enumerations: self.blueprint.enumerations(),
            defaults: self.blueprint.defaults(),
            combo,
        };
        formula::evaluate(&rewritten, &bindings)
    }

    /// Replace `enumerations.<section>.<subfield>[<field>]` with the table
    /// entry keyed by the combination's value for `<field>`.
    fn rewrite_subscripts(
        &self,
        expression: &str,
        combo: &Combination,
    ) -> Result<String, ReentryError> {
        let mut out = String::with_capacity(expression.len());
        let mut last = 0;
        for caps in ENUM_SUBSCRIPT.captures_iter(expression) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let (section, subfield, field_name) = (&caps[1], &caps[2], &caps[3]);
            let field: Field = field_name.parse().map_err(|_| ReentryError::Reference {
                path: format!("combination.{}", field_name),
            })?;
            let key = match combo.get(field) {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let value = self
                .blueprint
                .enumerations()
                .get(section)
                .and_then(|s| s.get(subfield))
                .and_then(|table| child(table, &key))
                .ok_or_else(|| ReentryError::Reference {
                    path: format!("enumerations.{}.{}[{}]", section, subfield, key),
                })?;

            out.push_str(&expression[last..whole.start()]);
            out.push_str(&render_literal(value, expression)?);
            last = whole.end();
        }
        out.push_str(&expression[last..]);
        Ok(out)
    }
}

fn render_literal(value: &Value, expression: &str) -> Result<String, ReentryError> {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|f| f < 0.0) => Ok(format!("({})", n)),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::String(s) => {
            let mut quoted = String::with_capacity(s.len() + 2);
            quoted.push('"');
            for ch in s.chars() {
                match ch {
                    '"' => quoted.push_str("\\\""),
                    '\\' => quoted.push_str("\\\\"),
                    '\n' => quoted.push_str("\\n"),
                    '\t' => quoted.push_str("\\t"),
                    _ => quoted.push(ch),
                }
            }
            quoted.push('"');
            Ok(quoted)
        }
        Value::Array(_) | Value::Object(_) => Err(ReentryError::evaluation(
            expression,
            "enumeration lookups must yield a scalar value",
        )),
    }
}
