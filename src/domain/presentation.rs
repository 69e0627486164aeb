//! Lookups over the `ui_requirements` section.

use crate::domain::blueprint::{Blueprint, lookup_path};
use serde_json::Value;

pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_GRID: &str = "combinations";

pub fn ui_config(bp: &Blueprint) -> &Value {
    bp.ui_requirements()
}

/// Column definitions of a named grid; empty when the grid is not declared.
pub fn grid_columns<'b>(bp: &'b Blueprint, grid: &str) -> &'b [Value] {
    bp.ui_requirements()
        .get("grids")
        .and_then(|grids| grids.get(grid))
        .and_then(|g| g.get("columns"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn color_for_decision<'b>(bp: &'b Blueprint, decision: &str) -> &'b str {
    color(bp, "decision", decision)
}

pub fn color_for_action<'b>(bp: &'b Blueprint, action: &str) -> &'b str {
    color(bp, "action", action)
}

fn color<'b>(bp: &'b Blueprint, map: &str, key: &str) -> &'b str {
    lookup_path(bp.ui_requirements(), &format!("presentation.color_map.{}", map))
        .and_then(|colors| colors.get(key))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blueprint() -> Blueprint {
        Blueprint::from_value(json!({
            "ui_requirements": {
                "grids": {
                    "combinations": {"columns": [{"key": "symbol"}, {"key": "decision"}]}
                },
                "presentation": {
                    "color_map": {
                        "decision": {"END_TRADING": "#cc0000"},
                        "action": {"SAME_TRADE": "#00aa00"}
                    }
                }
            }
        }))
    }

    #[test]
    fn grid_columns_by_name() {
        let bp = blueprint();
        assert_eq!(grid_columns(&bp, DEFAULT_GRID).len(), 2);
        assert!(grid_columns(&bp, "cells").is_empty());
    }

    #[test]
    fn known_colors() {
        let bp = blueprint();
        assert_eq!(color_for_decision(&bp, "END_TRADING"), "#cc0000");
        assert_eq!(color_for_action(&bp, "SAME_TRADE"), "#00aa00");
    }

    #[test]
    fn unknown_colors_default_to_black() {
        let bp = blueprint();
        assert_eq!(color_for_decision(&bp, "REENTER"), DEFAULT_COLOR);
        assert_eq!(color_for_action(&bp, "REVERSE"), DEFAULT_COLOR);
        let empty = Blueprint::from_value(json!({}));
        assert_eq!(color_for_action(&empty, "SAME_TRADE"), DEFAULT_COLOR);
        assert!(ui_config(&empty).is_null());
    }
}
