//! Rule AST data structures.
//!
//! This module defines the compiled form of blueprint rules:
//! - `Operator`: the closed set of leaf comparisons, each carrying its literal
//! - `Condition`: a leaf test of one combination field
//! - `ConditionBlock`: `all_of` / `any_of` / `not` composition
//! - `Rule`: a prioritized condition block with its output
//! - `RuleCollection`: which of the three blueprint collections a rule came from

use crate::domain::combination::Field;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Ge(Value),
    Gt(Value),
    Le(Value),
    Lt(Value),
    Between { lower: Value, upper: Value },
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq(_) => "eq",
            Operator::Ne(_) => "ne",
            Operator::In(_) => "in",
            Operator::Nin(_) => "nin",
            Operator::Ge(_) => "ge",
            Operator::Gt(_) => "gt",
            Operator::Le(_) => "le",
            Operator::Lt(_) => "lt",
            Operator::Between { .. } => "between",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub op: Operator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionBlock {
    /// Empty or absent `when`.
    Always,
    AllOf(Vec<Condition>),
    AnyOf(Vec<Condition>),
    Not(Box<ConditionBlock>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCollection {
    Invariants,
    DefaultCellRules,
    DefaultCombinationRules,
}

impl RuleCollection {
    pub const ALL: [RuleCollection; 3] = [
        RuleCollection::Invariants,
        RuleCollection::DefaultCellRules,
        RuleCollection::DefaultCombinationRules,
    ];

    /// Key of the collection under the blueprint's `rules` section.
    pub fn key(self) -> &'static str {
        match self {
            RuleCollection::Invariants => "invariants",
            RuleCollection::DefaultCellRules => "default_cell_rules",
            RuleCollection::DefaultCombinationRules => "default_combination_rules",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutput {
    /// `then.decision` with its (unresolved) parameter map.
    Decision {
        decision: String,
        parameters: Map<String, Value>,
    },
    /// Unresolved `set_cell` map.
    Cell(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub priority: i64,
    /// Position in the blueprint's declaration order.
    pub index: usize,
    pub when: ConditionBlock,
    pub output: RuleOutput,
}
