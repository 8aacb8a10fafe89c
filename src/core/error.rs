use thiserror::Error;

/// Errors that can occur during tax computation or document processing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FiscalError {
    /// A tax is configured with a rule that is missing or failed to evaluate.
    #[error("invalid configuration of tax '{tax}': {cause}")]
    Configuration {
        /// Name of the offending tax.
        tax: String,
        /// Underlying cause reported by the rule.
        cause: String,
    },

    /// Division by zero or a value outside the decimal range.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// One or more validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation not allowed in the document's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Fiscal stamp could not be applied.
    #[error("fiscal stamp error: {0}")]
    Stamp(String),

    /// Reference sequencing error.
    #[error("numbering error: {0}")]
    Numbering(String),
}

impl FiscalError {
    pub(crate) fn configuration(tax: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Configuration {
            tax: tax.into(),
            cause: cause.to_string(),
        }
    }
}

/// Error returned by a [`CodeRule`](super::CodeRule) when it cannot evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuleError(pub String);

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "invoice_repartition[1].factor").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Short rule identifier if applicable (e.g. "TAX-REP-01").
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
    /// Create a validation error without a rule ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error with a rule ID.
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
