use thiserror::Error;

/// Errors surfaced by the compliance engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KontorError {
    /// Bad input shape or value — caller's fault, recoverable by
    /// correcting the input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Attempted mutation of a record inside a locked accounting period.
    /// Recoverable by unlocking the period with a reason (which is itself
    /// audited).
    #[error("period {period} is locked (record date {date})")]
    PeriodLocked {
        /// Canonical key of the blocking period (e.g. `2024-Q2`).
        period: String,
        /// Date of the record whose mutation was rejected.
        date: chrono::NaiveDate,
    },

    /// E-invoice XML whose root element / namespace is not a recognized
    /// ZUGFeRD or XRechnung document.
    #[error("unsupported e-invoice format: {0}")]
    UnsupportedFormat(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

/// A single EN 16931 business-rule violation with a stable rule code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Rule identifier (e.g. "BR-02", "BR-CO-10", "W-PAY").
    pub rule: String,
    /// Dot-separated path to the offending field (e.g. "seller.vat_id").
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    pub fn new(
        rule: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.rule, self.field, self.message)
    }
}

/// Outcome of a compliance validation run. Collects every rule breach
/// instead of stopping at the first, so a batch caller can report all
/// problems at once.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Rule violations that make the document non-compliant.
    pub errors: Vec<Violation>,
    /// Advisory findings — the document remains valid.
    pub warnings: Vec<Violation>,
}

impl ValidationReport {
    /// A report is valid when no errors were recorded; warnings do not
    /// affect validity.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if the given rule code appears among the errors.
    pub fn has_error(&self, rule: &str) -> bool {
        self.errors.iter().any(|v| v.rule == rule)
    }

    /// True if the given rule code appears among the warnings.
    pub fn has_warning(&self, rule: &str) -> bool {
        self.warnings.iter().any(|v| v.rule == rule)
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "valid ({} warnings)", self.warnings.len())
        } else {
            write!(f, "{} errors", self.errors.len())?;
            for v in &self.errors {
                write!(f, "\n  {v}")?;
            }
            Ok(())
        }
    }
}
