//! Prioritized first-match rule engine.
//!
//! The three rule collections of a blueprint are compiled once at
//! construction and sorted by priority (descending, stable). Each evaluation
//! walks one collection and returns the resolved output of the first rule
//! whose condition holds, or the collection's terminal result.

use crate::domain::blueprint::Blueprint;
use crate::domain::combination::Combination;
use crate::domain::decision::{CellResult, DecisionResult, DecisionSource, SourcedDecision};
use crate::domain::error::ReentryError;
use crate::domain::resolver::ExpressionResolver;
use crate::domain::rule::{Rule, RuleCollection, RuleOutput};
use crate::domain::rule_eval;
use crate::domain::rule_parser::parse_collection;
use crate::domain::value_ops::number_as_i64;
use serde_json::{Map, Value};

const DEFAULT_SIZE_MULTIPLIER: f64 = 1.0;
const DEFAULT_CONFIDENCE_ADJUSTMENT: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct RuleEngine<'a> {
    blueprint: &'a Blueprint,
    resolver: ExpressionResolver<'a>,
    invariants: Vec<Rule>,
    cell_rules: Vec<Rule>,
    combination_rules: Vec<Rule>,
}

impl<'a> RuleEngine<'a> {
    pub fn new(blueprint: &'a Blueprint) -> Result<Self, ReentryError> {
        let compile = |collection| -> Result<Vec<Rule>, ReentryError> {
            let mut rules = parse_collection(blueprint.rules(), collection)?;
            rules.sort_by(|a, b| b.priority.cmp(&a.priority));
            Ok(rules)
        };

        let engine = Self {
            blueprint,
            resolver: ExpressionResolver::new(blueprint),
            invariants: compile(RuleCollection::Invariants)?,
            cell_rules: compile(RuleCollection::DefaultCellRules)?,
            combination_rules: compile(RuleCollection::DefaultCombinationRules)?,
        };
        tracing::debug!(
            invariants = engine.invariants.len(),
            cell_rules = engine.cell_rules.len(),
            combination_rules = engine.combination_rules.len(),
            "compiled rule collections"
        );
        Ok(engine)
    }

    pub fn blueprint(&self) -> &'a Blueprint {
        self.blueprint
    }

    /// Rules of one collection in evaluation order.
    pub fn rules(&self, collection: RuleCollection) -> &[Rule] {
        match collection {
            RuleCollection::Invariants => &self.invariants,
            RuleCollection::DefaultCellRules => &self.cell_rules,
            RuleCollection::DefaultCombinationRules => &self.combination_rules,
        }
    }

    pub fn evaluate_invariants(
        &self,
        combo: &Combination,
    ) -> Result<Option<DecisionResult>, ReentryError> {
        match first_match(RuleCollection::Invariants, &self.invariants, combo)? {
            Some(rule) => self.decision_output(rule, combo).map(Some),
            None => Ok(None),
        }
    }

    pub fn evaluate_combination_defaults(
        &self,
        combo: &Combination,
    ) -> Result<DecisionResult, ReentryError> {
        match first_match(
            RuleCollection::DefaultCombinationRules,
            &self.combination_rules,
            combo,
        )? {
            Some(rule) => self.decision_output(rule, combo),
            None => {
                tracing::debug!("no combination rule matched, ending trading");
                Ok(DecisionResult::end_trading())
            }
        }
    }

    pub fn evaluate_decision(&self, combo: &Combination) -> Result<DecisionResult, ReentryError> {
        self.evaluate_decision_with_source(combo)
            .map(|sourced| sourced.result)
    }

    /// Like [`evaluate_decision`](Self::evaluate_decision), also reporting
    /// which layer produced the decision.
    pub fn evaluate_decision_with_source(
        &self,
        combo: &Combination,
    ) -> Result<SourcedDecision, ReentryError> {
        if let Some(result) = self.evaluate_invariants(combo)? {
            return Ok(SourcedDecision {
                result,
                source: DecisionSource::Invariant,
            });
        }
        Ok(SourcedDecision {
            result: self.evaluate_combination_defaults(combo)?,
            source: DecisionSource::DefaultRules,
        })
    }

    pub fn evaluate_cell(&self, combo: &Combination) -> Result<CellResult, ReentryError> {
        let Some(rule) = first_match(RuleCollection::DefaultCellRules, &self.cell_rules, combo)?
        else {
            tracing::debug!("no cell rule matched");
            return Ok(CellResult::no_reentry());
        };
        let RuleOutput::Cell(set_cell) = &rule.output else {
            return Err(ReentryError::rule("cell rule without a set_cell output"));
        };
        let resolved = self.resolver.resolve_map(set_cell, combo)?;
        cell_from_map(resolved)
    }

    fn decision_output(&self, rule: &Rule, combo: &Combination) -> Result<DecisionResult, ReentryError> {
        let RuleOutput::Decision {
            decision,
            parameters,
        } = &rule.output
        else {
            return Err(ReentryError::rule("decision rule without a decision output"));
        };
        Ok(DecisionResult {
            decision: decision.clone(),
            parameter_set: self.resolver.resolve_map(parameters, combo)?,
        })
    }
}

fn first_match<'r>(
    collection: RuleCollection,
    rules: &'r [Rule],
    combo: &Combination,
) -> Result<Option<&'r Rule>, ReentryError> {
    for rule in rules {
        if rule_eval::evaluate(&rule.when, combo)? {
            tracing::debug!(
                collection = collection.key(),
                index = rule.index,
                priority = rule.priority,
                "rule matched"
            );
            return Ok(Some(rule));
        }
    }
    Ok(None)
}

fn cell_from_map(mut map: Map<String, Value>) -> Result<CellResult, ReentryError> {
    let action = match map.remove("action") {
        Some(Value::String(action)) => action,
        Some(other) => {
            return Err(ReentryError::rule(format!(
                "set_cell.action must be a string, got {}",
                other
            )));
        }
        None => return Err(ReentryError::rule("set_cell is missing 'action'")),
    };
    let size_multiplier = take_float(&mut map, "size_multiplier", DEFAULT_SIZE_MULTIPLIER)?;
    let confidence_adjustment =
        take_float(&mut map, "confidence_adjustment", DEFAULT_CONFIDENCE_ADJUSTMENT)?;
    let delay_minutes = take_integer(&mut map, "delay_minutes")?;
    let max_attempts = take_integer(&mut map, "max_attempts")?;

    Ok(CellResult {
        action,
        size_multiplier,
        confidence_adjustment,
        delay_minutes,
        max_attempts,
        extra: map,
    })
}

fn take_float(map: &mut Map<String, Value>, key: &str, default: f64) -> Result<f64, ReentryError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ReentryError::rule(format!("set_cell.{} is not a finite number", key))),
        Some(other) => Err(ReentryError::rule(format!(
            "set_cell.{} must be numeric, got {}",
            key, other
        ))),
    }
}

fn take_integer(map: &mut Map<String, Value>, key: &str) -> Result<i64, ReentryError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => number_as_i64(&n).ok_or_else(|| {
            ReentryError::rule(format!("set_cell.{} must be an integer, got {}", key, n))
        }),
        Some(other) => Err(ReentryError::rule(format!(
            "set_cell.{} must be an integer, got {}",
            key, other
        ))),
    }
}
