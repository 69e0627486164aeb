#![allow(dead_code)]

use reentry::domain::blueprint::Blueprint;
use reentry::domain::combination::Combination;
use reentry::domain::error::ReentryError;
use reentry::ports::blueprint_port::BlueprintPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BLUEPRINT_JSON: &str = r##"{
  "schema_version": "3.0",
  "conventions": {
    "canonical_coordinate_order": ["symbol", "signal_type", "time_category", "outcome", "context", "generation"],
    "id_format": {
      "readable": {
        "template": "{symbol}-{signal_type}-{time_category}-O{outcome}-{context}-G{generation}",
        "regex": "(?P<symbol>[A-Z]{6})-(?P<signal_type>[A-Z_]+)-(?P<time_category>[A-Z_]+)-O(?P<outcome>[1-6])-(?P<context>[A-Z0-9_]+)-G(?P<generation>\\d+)$"
      },
      "compact": {
        "template": "{symbol}:{signal_type}:{time_category}:{outcome}:{context}:{generation:02d}",
        "regex": "(?P<symbol>[A-Z]{6}):(?P<signal_type>[A-Z_]+):(?P<time_category>[A-Z_]+):(?P<outcome>[1-6]):(?P<context>[A-Z0-9_]+):(?P<generation>\\d{2})$"
      }
    }
  },
  "enumerations": {
    "symbol": {"pattern": "[A-Z]{6}$"},
    "signal_type": {"allowed": ["ECO_HIGH", "ECO_MED", "ANTICIPATION", "TECHNICAL"]},
    "time_category": {"allowed": ["FLASH", "QUICK", "LONG", "EXTENDED"]},
    "outcome": {"allowed": [1, 2, 3, 4, 5, 6]},
    "context": {"allowed": ["PRE_1H", "POST_30M", "NONE"]},
    "generation": {"range": {"min": 1, "max": 3}},
    "outcome_weight": {"table": {"1": 0.0, "2": 0.5, "3": 0.75, "4": 1.0, "5": 1.25, "6": 1.5}}
  },
  "defaults": {
    "parameter_sets": {
      "standard": {"size_multiplier": 1.0, "confidence_adjustment": 1.0, "delay_minutes": 15, "max_attempts": 2},
      "cautious": {"size_multiplier": 0.5, "confidence_adjustment": 0.8, "delay_minutes": 30, "max_attempts": 1}
    },
    "base_delay": 10
  },
  "persistence": {"database": "reentry.db"},
  "rules": {
    "invariants": [
      {"priority": 100,
       "when": {"all_of": [{"field": "generation", "op": "ge", "value": 3}]},
       "then": {"decision": "END_TRADING", "parameter_overrides": {"reason": "generation limit"}}},
      {"priority": 90,
       "when": {"all_of": [{"field": "outcome", "op": "eq", "value": 1}, {"field": "context", "op": "eq", "value": "PRE_1H"}]},
       "then": {"decision": "NO_REENTRY"}}
    ],
    "default_combination_rules": [
      {"priority": 10,
       "when": {"any_of": [{"field": "signal_type", "op": "in", "value": ["ECO_HIGH", "ECO_MED"]}]},
       "then": {"decision": "REENTER", "parameter_set": {
         "params": "$ref.defaults.parameter_sets.standard",
         "size_multiplier": "$calc:enumerations.outcome_weight.table[outcome] * 2",
         "delay_minutes": "$calc:defaults.base_delay * generation"
       }}},
      {"priority": 5,
       "when": {"not": {"all_of": [{"field": "time_category", "op": "eq", "value": "FLASH"}]}},
       "then": {"decision": "REENTER_CAUTIOUS", "parameter_set": {"params": "$ref.defaults.parameter_sets.cautious"}}}
    ],
    "default_cell_rules": [
      {"priority": 20,
       "when": {"all_of": [{"field": "outcome", "op": "between", "value": [4, 6]}]},
       "set_cell": {"action": "SAME_TRADE", "size_multiplier": "$calc:enumerations.outcome_weight.table[outcome]", "delay_minutes": 5}},
      {"priority": 10,
       "when": {"all_of": [{"field": "outcome", "op": "le", "value": 3}, {"field": "outcome", "op": "gt", "value": 1}]},
       "set_cell": {"action": "REVERSE", "max_attempts": 1, "note": "$ref.persistence.database"}}
    ]
  },
  "ui_requirements": {
    "grids": {"combinations": {"columns": [{"key": "combination_id"}, {"key": "decision"}]}},
    "presentation": {"color_map": {
      "decision": {"REENTER": "#2e7d32", "END_TRADING": "#c62828"},
      "action": {"SAME_TRADE": "#1565c0"}
    }}
  }
}"##;

pub const BLUEPRINT_YAML: &str = r#"
schema_version: "3.0-yaml"
conventions:
  canonical_coordinate_order: [symbol, signal_type, time_category, outcome, context, generation]
  id_format:
    readable:
      template: "{symbol}-{signal_type}-{time_category}-O{outcome}-{context}-G{generation}"
      regex: '(?P<symbol>[A-Z]{6})-(?P<signal_type>[A-Z_]+)-(?P<time_category>[A-Z_]+)-O(?P<outcome>[1-6])-(?P<context>[A-Z0-9_]+)-G(?P<generation>\d+)$'
    compact:
      template: "{symbol}:{signal_type}:{time_category}:{outcome}:{context}:{generation:02d}"
      regex: '(?P<symbol>[A-Z]{6}):(?P<signal_type>[A-Z_]+):(?P<time_category>[A-Z_]+):(?P<outcome>[1-6]):(?P<context>[A-Z0-9_]+):(?P<generation>\d{2})$'
enumerations:
  outcome_weight:
    table:
      1: 10
      2: 20
defaults: {}
persistence: {}
rules:
  default_combination_rules:
    - priority: 1
      when: {}
      then:
        decision: REENTER
        parameter_set:
          weight: "$calc:enumerations.outcome_weight.table[outcome] * 2"
ui_requirements: {}
"#;

pub fn sample_blueprint() -> Blueprint {
    Blueprint::parse(BLUEPRINT_JSON, "fixture.json").unwrap()
}

pub fn combo(
    signal_type: &str,
    time_category: &str,
    outcome: i64,
    context: &str,
    generation: i64,
) -> Combination {
    Combination {
        symbol: "EURUSD".to_string(),
        signal_type: signal_type.to_string(),
        time_category: time_category.to_string(),
        outcome,
        context: context.to_string(),
        generation,
    }
}

pub fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Serves blueprints from memory, keyed by path.
pub struct InMemoryBlueprintPort {
    pub documents: HashMap<PathBuf, Blueprint>,
}

impl InMemoryBlueprintPort {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    pub fn with_blueprint(mut self, path: &str, bp: Blueprint) -> Self {
        self.documents.insert(PathBuf::from(path), bp);
        self
    }
}

impl BlueprintPort for InMemoryBlueprintPort {
    fn load(&self, path: &Path, _schema_path: Option<&Path>) -> Result<Blueprint, ReentryError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| ReentryError::DocumentNotFound {
                path: path.display().to_string(),
            })
    }
}
