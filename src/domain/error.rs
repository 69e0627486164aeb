//! Domain error types.

/// A parse error with position information for formula parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Character offset into the parsed input.
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for reentry.
#[derive(Debug, thiserror::Error)]
pub enum ReentryError {
    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("could not parse document {path}: {reason}")]
    DocumentParse { path: String, reason: String },

    #[error("blueprint validation failed: {}", .violations.join("; "))]
    Validation { violations: Vec<String> },

    #[error("invalid combination field {field}: {reason}")]
    InvalidCombination { field: String, reason: String },

    #[error("identifier format error: {reason}")]
    Format { reason: String },

    #[error("unresolved reference: {path}")]
    Reference { path: String },

    #[error("cannot evaluate '{expression}': {reason}")]
    Evaluation { expression: String, reason: String },

    #[error("invalid rule: {reason}")]
    Rule { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReentryError {
    pub(crate) fn rule(reason: impl Into<String>) -> Self {
        ReentryError::Rule {
            reason: reason.into(),
        }
    }

    pub(crate) fn format(reason: impl Into<String>) -> Self {
        ReentryError::Format {
            reason: reason.into(),
        }
    }

    pub(crate) fn evaluation(expression: &str, reason: impl Into<String>) -> Self {
        ReentryError::Evaluation {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ReentryError> for std::process::ExitCode {
    fn from(err: &ReentryError) -> Self {
        let code: u8 = match err {
            ReentryError::Io(_) => 1,
            ReentryError::DocumentNotFound { .. }
            | ReentryError::DocumentParse { .. }
            | ReentryError::ConfigParse { .. }
            | ReentryError::ConfigMissing { .. } => 2,
            ReentryError::Validation { .. } => 3,
            ReentryError::InvalidCombination { .. } | ReentryError::Format { .. } => 4,
            ReentryError::Reference { .. }
            | ReentryError::Evaluation { .. }
            | ReentryError::Rule { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context_points_at_position() {
        let err = ParseError {
            message: "unexpected character '$'".into(),
            position: 4,
        };
        let ctx = err.display_with_context("1 + $");
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines[0], "1 + $");
        assert_eq!(lines[1], "    ^");
        assert!(lines[2].contains("position 4"));
    }

    #[test]
    fn validation_message_lists_every_violation() {
        let err = ReentryError::Validation {
            violations: vec!["missing key 'rules'".into(), "missing key 'persistence'".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'rules'"));
        assert!(msg.contains("'persistence'"));
    }

    #[test]
    fn exit_codes_group_error_classes() {
        use std::process::ExitCode;
        let not_found = ReentryError::DocumentNotFound { path: "x".into() };
        let rule = ReentryError::rule("bad op");
        assert_eq!(
            format!("{:?}", ExitCode::from(&not_found)),
            format!("{:?}", ExitCode::from(2))
        );
        assert_eq!(
            format!("{:?}", ExitCode::from(&rule)),
            format!("{:?}", ExitCode::from(5))
        );
    }
}
