//! INI file adapter for the binary's runtime settings.

use crate::domain::error::ReentryError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReentryError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| ReentryError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        tracing::debug!(path = %path.display(), "loaded runtime config");
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ReentryError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ReentryError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[blueprint]
path = /etc/reentry/blueprint.yaml
schema_path = /etc/reentry/schema.json

[output]
compact_ids = yes
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("blueprint", "path"),
            Some("/etc/reentry/blueprint.yaml".to_string())
        );
        assert_eq!(
            adapter.get_string("blueprint", "schema_path"),
            Some("/etc/reentry/schema.json".to_string())
        );
        assert!(adapter.get_bool("output", "compact_ids", false));
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[blueprint]\npath = a.json\n").unwrap();
        assert_eq!(adapter.get_string("blueprint", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn require_string_reports_missing_key() {
        let adapter = FileConfigAdapter::from_string("[blueprint]\n").unwrap();
        let err = adapter.require_string("blueprint", "path").unwrap_err();
        assert!(
            matches!(err, ReentryError::ConfigMissing { section, key } if section == "blueprint" && key == "path")
        );
    }

    #[test]
    fn get_bool_returns_true_values() {
        let adapter =
            FileConfigAdapter::from_string("[output]\na = true\nb = yes\nc = 1\n").unwrap();
        assert!(adapter.get_bool("output", "a", false));
        assert!(adapter.get_bool("output", "b", false));
        assert!(adapter.get_bool("output", "c", false));
    }

    #[test]
    fn get_bool_returns_false_values() {
        let adapter =
            FileConfigAdapter::from_string("[output]\na = false\nb = no\nc = 0\n").unwrap();
        assert!(!adapter.get_bool("output", "a", true));
        assert!(!adapter.get_bool("output", "b", true));
        assert!(!adapter.get_bool("output", "c", true));
    }

    #[test]
    fn get_bool_returns_default_for_missing_or_garbage() {
        let adapter = FileConfigAdapter::from_string("[output]\npretty = maybe\n").unwrap();
        assert!(adapter.get_bool("output", "missing", true));
        assert!(!adapter.get_bool("output", "pretty", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[blueprint]\npath = /srv/blueprint.json\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("blueprint", "path"),
            Some("/srv/blueprint.json".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/reentry.ini");
        assert!(matches!(result, Err(ReentryError::ConfigParse { .. })));
    }
}
