//! Evaluation outputs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const END_TRADING: &str = "END_TRADING";
pub const NO_REENTRY: &str = "NO_REENTRY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: String,
    pub parameter_set: Map<String, Value>,
}

impl DecisionResult {
    /// Result when no combination-default rule matches.
    pub fn end_trading() -> Self {
        let mut parameter_set = Map::new();
        parameter_set.insert("size_multiplier".into(), json!(0.0));
        parameter_set.insert("confidence_adjustment".into(), json!(0.0));
        parameter_set.insert("delay_minutes".into(), json!(0));
        parameter_set.insert("max_attempts".into(), json!(0));
        Self {
            decision: END_TRADING.to_string(),
            parameter_set,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Invariant,
    DefaultRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedDecision {
    #[serde(flatten)]
    pub result: DecisionResult,
    pub source: DecisionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellResult {
    pub action: String,
    pub size_multiplier: f64,
    pub confidence_adjustment: f64,
    pub delay_minutes: i64,
    pub max_attempts: i64,
    /// Any further `set_cell` keys, resolved.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CellResult {
    /// Result when no cell rule matches.
    pub fn no_reentry() -> Self {
        Self {
            action: NO_REENTRY.to_string(),
            size_multiplier: 0.0,
            confidence_adjustment: 0.0,
            delay_minutes: 0,
            max_attempts: 0,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_decision_shape() {
        let value = serde_json::to_value(DecisionResult::end_trading()).unwrap();
        assert_eq!(
            value,
            json!({
                "decision": "END_TRADING",
                "parameter_set": {
                    "size_multiplier": 0.0,
                    "confidence_adjustment": 0.0,
                    "delay_minutes": 0,
                    "max_attempts": 0
                }
            })
        );
    }

    #[test]
    fn sourced_decision_flattens() {
        let sourced = SourcedDecision {
            result: DecisionResult {
                decision: "REENTER".into(),
                parameter_set: Map::new(),
            },
            source: DecisionSource::DefaultRules,
        };
        let value = serde_json::to_value(sourced).unwrap();
        assert_eq!(
            value,
            json!({"decision": "REENTER", "parameter_set": {}, "source": "default_rules"})
        );
    }

    #[test]
    fn cell_extra_keys_flatten() {
        let mut cell = CellResult::no_reentry();
        cell.extra.insert("note".into(), json!("cooldown"));
        let value = serde_json::to_value(&cell).unwrap();
        assert_eq!(value["action"], json!("NO_REENTRY"));
        assert_eq!(value["note"], json!("cooldown"));
        assert_eq!(value["delay_minutes"], json!(0));
    }
}
