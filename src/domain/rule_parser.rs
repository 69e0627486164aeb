//! Rule compiler.
//!
//! Converts the blueprint's rule collections into the [`Rule`] AST. Malformed
//! rules are rejected here with an error naming the rule's location:
//! unknown operators or fields, a block declaring more than one combinator,
//! list operators without a list, `between` without a `[lo, hi]` pair.

use crate::domain::combination::Field;
use crate::domain::error::ReentryError;
use crate::domain::rule::{Condition, ConditionBlock, Operator, Rule, RuleCollection, RuleOutput};
use crate::domain::value_ops::number_as_i64;
use serde_json::{Map, Value};

const COMBINATORS: [&str; 3] = ["all_of", "any_of", "not"];

/// Deepest chain of `not` blocks a rule may declare.
pub const MAX_BLOCK_DEPTH: usize = 64;

/// Compile one collection from the blueprint's `rules` section.
///
/// An absent collection compiles to no rules.
pub fn parse_collection(rules: &Value, collection: RuleCollection) -> Result<Vec<Rule>, ReentryError> {
    let entries = match rules.get(collection.key()) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ReentryError::rule(format!(
                "rules.{} must be a list",
                collection.key()
            )));
        }
    };
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_rule(entry, collection, index))
        .collect()
}

pub fn parse_rule(
    value: &Value,
    collection: RuleCollection,
    index: usize,
) -> Result<Rule, ReentryError> {
    let location = format!("rules.{}[{}]", collection.key(), index);
    let locate = |err: ReentryError| match err {
        ReentryError::Rule { reason } => ReentryError::rule(format!("{}: {}", location, reason)),
        other => other,
    };

    let rule = value
        .as_object()
        .ok_or_else(|| ReentryError::rule("rule must be a mapping"))
        .map_err(locate)?;
    let priority = parse_priority(rule.get("priority")).map_err(locate)?;
    let when = parse_block(rule.get("when").unwrap_or(&Value::Null)).map_err(locate)?;
    let output = match collection {
        RuleCollection::Invariants => parse_decision(rule, "parameter_overrides"),
        RuleCollection::DefaultCombinationRules => parse_decision(rule, "parameter_set"),
        RuleCollection::DefaultCellRules => parse_cell(rule),
    }
    .map_err(locate)?;

    Ok(Rule {
        priority,
        index,
        when,
        output,
    })
}

fn parse_priority(value: Option<&Value>) -> Result<i64, ReentryError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => number_as_i64(n)
            .ok_or_else(|| ReentryError::rule(format!("priority must be an integer, got {}", n))),
        Some(other) => Err(ReentryError::rule(format!(
            "priority must be an integer, got {}",
            other
        ))),
    }
}

pub fn parse_block(value: &Value) -> Result<ConditionBlock, ReentryError> {
    parse_block_at(value, 0)
}

fn parse_block_at(value: &Value, depth: usize) -> Result<ConditionBlock, ReentryError> {
    if depth > MAX_BLOCK_DEPTH {
        return Err(ReentryError::rule(format!(
            "condition blocks nest deeper than {} levels",
            MAX_BLOCK_DEPTH
        )));
    }
    let map = match value {
        Value::Null => return Ok(ConditionBlock::Always),
        Value::Object(map) if map.is_empty() => return Ok(ConditionBlock::Always),
        Value::Object(map) => map,
        other => {
            return Err(ReentryError::rule(format!(
                "condition block must be a mapping, got {}",
                other
            )));
        }
    };

    if let Some(unknown) = map.keys().find(|k| !COMBINATORS.contains(&k.as_str())) {
        return Err(ReentryError::rule(format!(
            "unknown condition key '{}'",
            unknown
        )));
    }
    let present: Vec<&str> = COMBINATORS
        .into_iter()
        .filter(|key| map.contains_key(*key))
        .collect();
    if present.len() > 1 {
        return Err(ReentryError::rule(format!(
            "condition block declares more than one combinator: {}",
            present.join(", ")
        )));
    }

    match present[0] {
        "all_of" => Ok(ConditionBlock::AllOf(parse_conditions(&map["all_of"], "all_of")?)),
        "any_of" => Ok(ConditionBlock::AnyOf(parse_conditions(&map["any_of"], "any_of")?)),
        _ => Ok(ConditionBlock::Not(Box::new(parse_block_at(&map["not"], depth + 1)?))),
    }
}

fn parse_conditions(value: &Value, key: &str) -> Result<Vec<Condition>, ReentryError> {
    let items = value
        .as_array()
        .ok_or_else(|| ReentryError::rule(format!("{} must be a list of conditions", key)))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            parse_condition(item).map_err(|err| match err {
                ReentryError::Rule { reason } => {
                    ReentryError::rule(format!("{}[{}]: {}", key, i, reason))
                }
                other => other,
            })
        })
        .collect()
}

pub fn parse_condition(value: &Value) -> Result<Condition, ReentryError> {
    let leaf = value
        .as_object()
        .ok_or_else(|| ReentryError::rule(format!("condition must be a mapping, got {}", value)))?;

    let field_name = leaf
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| ReentryError::rule("condition is missing 'field'"))?;
    let field: Field = field_name.parse().map_err(ReentryError::rule)?;

    let op_name = leaf
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| ReentryError::rule("condition is missing 'op'"))?;
    let literal = leaf
        .get("value")
        .ok_or_else(|| ReentryError::rule(format!("'{}' condition is missing 'value'", op_name)))?;

    let list = |name: &str| -> Result<Vec<Value>, ReentryError> {
        literal
            .as_array()
            .cloned()
            .ok_or_else(|| ReentryError::rule(format!("'{}' requires a list value", name)))
    };

    let op = match op_name {
        "eq" => Operator::Eq(literal.clone()),
        "ne" => Operator::Ne(literal.clone()),
        "in" => Operator::In(list("in")?),
        "nin" => Operator::Nin(list("nin")?),
        "ge" => Operator::Ge(literal.clone()),
        "gt" => Operator::Gt(literal.clone()),
        "le" => Operator::Le(literal.clone()),
        "lt" => Operator::Lt(literal.clone()),
        "between" => match literal.as_array().map(Vec::as_slice) {
            Some([lower, upper]) => Operator::Between {
                lower: lower.clone(),
                upper: upper.clone(),
            },
            _ => {
                return Err(ReentryError::rule(format!(
                    "'between' requires a [lo, hi] pair, got {}",
                    literal
                )));
            }
        },
        other => return Err(ReentryError::rule(format!("unknown operator '{}'", other))),
    };

    Ok(Condition { field, op })
}

fn parse_decision(rule: &Map<String, Value>, parameters_key: &str) -> Result<RuleOutput, ReentryError> {
    let then = rule
        .get("then")
        .and_then(Value::as_object)
        .ok_or_else(|| ReentryError::rule("rule is missing a 'then' mapping"))?;
    let decision = then
        .get("decision")
        .and_then(Value::as_str)
        .ok_or_else(|| ReentryError::rule("'then' is missing a string 'decision'"))?;
    let parameters = match then.get(parameters_key) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(ReentryError::rule(format!(
                "then.{} must be a mapping, got {}",
                parameters_key, other
            )));
        }
    };
    Ok(RuleOutput::Decision {
        decision: decision.to_string(),
        parameters,
    })
}

fn parse_cell(rule: &Map<String, Value>) -> Result<RuleOutput, ReentryError> {
    rule.get("set_cell")
        .and_then(Value::as_object)
        .map(|map| RuleOutput::Cell(map.clone()))
        .ok_or_else(|| ReentryError::rule("rule is missing a 'set_cell' mapping"))
}
