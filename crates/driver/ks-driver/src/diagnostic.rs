//! Diagnostics and the per-unit report.

use ks_ir::WireUnit;
use ks_span::{ErrorKind, Location};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The unit is rejected
    Error,
    /// Reported, but the unit still checks
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One finding of the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Item and operation the finding is about
    pub location: Location,
    /// Category
    pub kind: ErrorKind,
    /// Error or warning
    pub severity: Severity,
    /// One-line message
    pub message: String,
    /// Suggested fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Diagnostic {
    /// An error diagnostic.
    pub fn error(location: Location, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            location,
            kind,
            severity: Severity::Error,
            message: message.into(),
            help: None,
        }
    }

    /// A warning diagnostic.
    pub fn warning(location: Location, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            location,
            kind,
            severity: Severity::Warning,
            message: message.into(),
            help: None,
        }
    }

    /// Attaches a help line.
    #[must_use]
    pub fn with_help(mut self, help: Option<String>) -> Self {
        self.help = help;
        self
    }

    /// Builds an error from any analysis error type, taking its help line
    /// from the `miette` diagnostic.
    pub fn from_error<E>(location: Location, kind: ErrorKind, err: &E) -> Self
    where
        E: miette::Diagnostic + ?Sized,
    {
        Self::error(location, kind, err.to_string())
            .with_help(err.help().map(|help| help.to_string()))
    }

    /// Whether the diagnostic rejects the unit.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.kind, self.location, self.message
        )
    }
}

/// Result of checking one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Unit name
    pub unit: String,
    /// Findings in deterministic order
    pub diagnostics: Vec<Diagnostic>,
    /// Annotated IR; present only when no error was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated: Option<WireUnit>,
}

impl Report {
    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Whether the unit checked cleanly. Unlike [`has_errors`](Self::has_errors)
    /// this stays accurate after [`truncate`](Self::truncate).
    pub fn passed(&self) -> bool {
        self.annotated.is_some()
    }

    /// Number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|diag| diag.is_error()).count()
    }

    /// Number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }

    /// Error diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }

    /// Kinds of every diagnostic, in report order.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.diagnostics.iter().map(|diag| diag.kind).collect()
    }

    /// Keeps at most `max` diagnostics; 0 keeps all.
    pub fn truncate(&mut self, max: usize) {
        if max != 0 {
            self.diagnostics.truncate(max);
        }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_span::FileSpan;

    fn report() -> Report {
        let span = FileSpan::synthetic();
        Report {
            unit: "demo".to_string(),
            diagnostics: vec![
                Diagnostic::warning(
                    Location::item("Wrapper", span),
                    ErrorKind::UnusedParameter,
                    "parameter `T` is never used",
                ),
                Diagnostic::error(
                    Location::op("main", 2, span),
                    ErrorKind::BorrowConflictError,
                    "cannot read `x` because it is borrowed as mutable",
                )
                .with_help(Some("release the loan".to_string())),
            ],
            annotated: None,
        }
    }

    #[test]
    fn test_counts() {
        let mut report = report();
        assert!(report.has_errors());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);

        report.truncate(1);
        assert!(!report.has_errors());
        report.truncate(0);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_display() {
        let report = report();
        assert_eq!(
            report.diagnostics[1].to_string(),
            "error[BorrowConflictError] main#2: cannot read `x` because it is borrowed as mutable"
        );
    }

    #[test]
    fn test_json_shape() {
        let json = report().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["unit"], "demo");
        assert_eq!(value["diagnostics"][0]["severity"], "warning");
        assert_eq!(value["diagnostics"][0]["kind"], "UnusedParameter");
        assert!(value["diagnostics"][0].get("help").is_none());
        assert_eq!(value["diagnostics"][1]["location"]["op"], 2);
        assert!(value.get("annotated").is_none());

        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report());
    }
}
