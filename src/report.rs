//! Conformance reports: individual problems and the aggregate verdict.
//!
//! Both types are immutable once constructed. `ValidationProblem` values are
//! created only from raw libxml2 error events inside this crate; the
//! constructors are `pub(crate)` so no caller can synthesize or reorder
//! findings after the fact.

use std::fmt;

use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

/// Severity of a single conformance problem.
///
/// libxml2 distinguishes warnings, errors, and fatal errors; fatal parse
/// failures are reported here as `Error` since both make the instance
/// non-conformant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One schema-conformance defect detected during a validation pass.
///
/// Line and column are 1-based positions in the instance source; `0` means
/// the underlying reader did not attach a position to the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationProblem {
    message: String,
    line: u32,
    column: u32,
    severity: Severity,
}

impl ValidationProblem {
    pub(crate) fn new(
        message: impl Into<String>,
        line: u32,
        column: u32,
        severity: Severity,
    ) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            severity,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based line of the problem, `0` when unknown.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column of the problem, `0` when unknown.
    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (0, _) => write!(f, "{}: {}", self.severity, self.message),
            (line, 0) => write!(f, "{} at line {}: {}", self.severity, line, self.message),
            (line, column) => write!(
                f,
                "{} at line {}, column {}: {}",
                self.severity, line, column, self.message
            ),
        }
    }
}

/// The aggregate verdict of one validation call.
///
/// Validity is derived: the result is valid exactly when no problems were
/// collected. There is no independently settable flag, so the inconsistent
/// state "valid but has problems" cannot be constructed. Problems appear in
/// detection order (the order the reader emitted them during the single
/// forward pass), without deduplication or sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    problems: Vec<ValidationProblem>,
}

impl ValidationResult {
    pub(crate) fn from_problems(problems: Vec<ValidationProblem>) -> Self {
        Self { problems }
    }

    /// True iff no problems were collected.
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    /// All collected problems, in detection order.
    pub fn problems(&self) -> &[ValidationProblem] {
        &self.problems
    }

    /// Number of `Severity::Error` problems.
    pub fn error_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|p| p.severity() == Severity::Error)
            .count()
    }

    /// Number of `Severity::Warning` problems.
    pub fn warning_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|p| p.severity() == Severity::Warning)
            .count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "valid")
        } else {
            write!(
                f,
                "invalid ({} problem{})",
                self.problems.len(),
                if self.problems.len() == 1 { "" } else { "s" }
            )
        }
    }
}

impl Serialize for ValidationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ValidationResult", 2)?;
        state.serialize_field("valid", &self.is_valid())?;
        state.serialize_field("problems", &self.problems)?;
        state.end()
    }
}
