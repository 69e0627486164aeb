//! Blueprint loader reading JSON or YAML documents from disk.

use crate::domain::blueprint::{Blueprint, parse_document};
use crate::domain::blueprint_validation::validate_blueprint;
use crate::domain::error::ReentryError;
use crate::ports::blueprint_port::BlueprintPort;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct FileBlueprintAdapter;

impl FileBlueprintAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl BlueprintPort for FileBlueprintAdapter {
    fn load(&self, path: &Path, schema_path: Option<&Path>) -> Result<Blueprint, ReentryError> {
        let text = read_document(path)?;
        let blueprint = Blueprint::parse(&text, &path.display().to_string())?;

        if let Some(schema_path) = schema_path {
            let schema = load_schema(schema_path)?;
            validate_blueprint(&blueprint, Some(&schema))?;
            tracing::debug!(schema = %schema_path.display(), "blueprint validated");
        }

        tracing::info!(
            path = %path.display(),
            schema_version = blueprint.schema_version().as_deref().unwrap_or("unknown"),
            "loaded blueprint"
        );
        Ok(blueprint)
    }
}

/// Load a blueprint from `path`, validating it when `schema_path` is given.
pub fn load(path: &Path, schema_path: Option<&Path>) -> Result<Blueprint, ReentryError> {
    FileBlueprintAdapter.load(path, schema_path)
}

fn read_document(path: &Path) -> Result<String, ReentryError> {
    if !path.exists() {
        return Err(ReentryError::DocumentNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

fn load_schema(path: &Path) -> Result<Value, ReentryError> {
    let text = read_document(path)?;
    parse_document(&text, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{
        "schema_version": "1.0",
        "conventions": {"canonical_coordinate_order":
            ["symbol", "signal_type", "time_category", "outcome", "context", "generation"]},
        "enumerations": {},
        "persistence": {},
        "rules": {},
        "ui_requirements": {}
    }"#;

    fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn loads_json_document() {
        let file = write_temp(MINIMAL, ".json");
        let bp = load(file.path(), None).unwrap();
        assert_eq!(bp.schema_version().as_deref(), Some("1.0"));
    }

    #[test]
    fn missing_document_is_not_found() {
        let err = load(Path::new("/nonexistent/blueprint.json"), None).unwrap_err();
        assert!(matches!(err, ReentryError::DocumentNotFound { path } if path.contains("blueprint.json")));
    }

    #[test]
    fn missing_schema_is_not_found() {
        let file = write_temp(MINIMAL, ".json");
        let err = load(file.path(), Some(Path::new("/nonexistent/schema.json"))).unwrap_err();
        assert!(matches!(err, ReentryError::DocumentNotFound { .. }));
    }

    #[test]
    fn schema_validation_reports_missing_keys() {
        let file = write_temp(r#"{"schema_version": "1.0", "rules": {}}"#, ".json");
        let schema = write_temp(r#"{"type": "object"}"#, ".json");
        let err = load(file.path(), Some(schema.path())).unwrap_err();
        match err {
            ReentryError::Validation { violations } => {
                let joined = violations.join("\n");
                assert!(joined.contains("conventions"));
                assert!(joined.contains("persistence"));
                assert!(joined.contains("ui_requirements"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn without_schema_no_validation_runs() {
        let file = write_temp(r#"{"rules": {}}"#, ".json");
        assert!(load(file.path(), None).is_ok());
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn loads_yaml_document() {
        let yaml = "schema_version: '2.1'\nenumerations:\n  outcome_weight:\n    table:\n      1: 10\n      2: 20\n";
        let file = write_temp(yaml, ".yaml");
        let bp = load(file.path(), None).unwrap();
        assert_eq!(bp.schema_version().as_deref(), Some("2.1"));
        assert_eq!(
            bp.lookup("enumerations.outcome_weight.table.2"),
            Some(&serde_json::json!(20))
        );
    }

    #[test]
    fn unparseable_document_fails() {
        let file = write_temp("{ not: [valid", ".txt");
        assert!(matches!(
            load(file.path(), None),
            Err(ReentryError::DocumentParse { .. })
        ));
    }
}
