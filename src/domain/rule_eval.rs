//! Condition evaluation.
//!
//! # Evaluation Semantics
//!
//! - `Always`: true
//! - `AllOf`: short-circuits on first `false`; an empty list is true
//! - `AnyOf`: short-circuits on first `true`; an empty list is false
//! - `Not`: negates the nested block
//! - `between`: inclusive on both bounds
//! - Ordered comparisons need number/number or string/string operands

use crate::domain::combination::Combination;
use crate::domain::error::ReentryError;
use crate::domain::rule::{Condition, ConditionBlock, Operator};
use crate::domain::value_ops::{compare_values, type_name, values_equal};
use serde_json::Value;
use std::cmp::Ordering;

pub fn evaluate(block: &ConditionBlock, combo: &Combination) -> Result<bool, ReentryError> {
    match block {
        ConditionBlock::Always => Ok(true),
        ConditionBlock::AllOf(conditions) => {
            for condition in conditions {
                if !evaluate_condition(condition, combo)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConditionBlock::AnyOf(conditions) => {
            for condition in conditions {
                if evaluate_condition(condition, combo)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ConditionBlock::Not(inner) => Ok(!evaluate(inner, combo)?),
    }
}

pub fn evaluate_condition(condition: &Condition, combo: &Combination) -> Result<bool, ReentryError> {
    let actual = combo.get(condition.field);
    let ordered = |expected: &Value| order(&actual, expected, condition);

    match &condition.op {
        Operator::Eq(expected) => Ok(values_equal(&actual, expected)),
        Operator::Ne(expected) => Ok(!values_equal(&actual, expected)),
        Operator::In(items) => Ok(items.iter().any(|item| values_equal(&actual, item))),
        Operator::Nin(items) => Ok(!items.iter().any(|item| values_equal(&actual, item))),
        Operator::Ge(expected) => Ok(ordered(expected)? != Ordering::Less),
        Operator::Gt(expected) => Ok(ordered(expected)? == Ordering::Greater),
        Operator::Le(expected) => Ok(ordered(expected)? != Ordering::Greater),
        Operator::Lt(expected) => Ok(ordered(expected)? == Ordering::Less),
        Operator::Between { lower, upper } => {
            Ok(ordered(lower)? != Ordering::Less && ordered(upper)? != Ordering::Greater)
        }
    }
}

fn order(actual: &Value, expected: &Value, condition: &Condition) -> Result<Ordering, ReentryError> {
    compare_values(actual, expected).ok_or_else(|| {
        ReentryError::rule(format!(
            "cannot apply '{}' to {} '{}' and {} {}",
            condition.op.name(),
            type_name(actual),
            condition.field,
            type_name(expected),
            expected
        ))
    })
}
