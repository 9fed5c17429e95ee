use thiserror::Error;

use super::types::DocumentStatus;

/// Errors that can occur during document construction or lifecycle handling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    /// One or more validation rules failed. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// Folio sequencing error.
    #[error("folio error: {0}")]
    Folio(String),

    /// A lifecycle transition that the state machine does not allow.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "recipient.zip").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// SAT error-matrix code if applicable (e.g. "CFDI40143").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule code.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error carrying a SAT error-matrix code.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}
