//! Variance inference errors.

use ks_span::{ErrorKind, FileSpan};
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by the variance engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum VarianceError {
    /// Variances of a constructor kept changing until the iteration cap.
    #[error("variance of `{item}` did not stabilize within {passes} passes")]
    #[diagnostic(
        code(kestrel::variance_cycle),
        help("raise `variance-iteration-cap` or check the recursive definitions of `{item}`")
    )]
    NoFixedPoint {
        /// Type constructor
        item: String,
        /// Passes performed
        passes: usize,
        /// Definition span
        span: FileSpan,
    },

    /// Variances were requested for a constructor the unit does not define.
    #[error("no type constructor named `{name}`")]
    #[diagnostic(code(kestrel::unknown_type))]
    UnknownType {
        /// Requested name
        name: String,
    },
}

impl VarianceError {
    /// Returns the primary source location for this error.
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::NoFixedPoint { span, .. } => *span,
            Self::UnknownType { .. } => FileSpan::synthetic(),
        }
    }

    /// Diagnostic category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoFixedPoint { .. } => ErrorKind::VarianceCycleError,
            Self::UnknownType { .. } => ErrorKind::MalformedIrError,
        }
    }

    /// Name of the constructor the error is about.
    #[must_use]
    pub fn item(&self) -> &str {
        match self {
            Self::NoFixedPoint { item, .. } => item,
            Self::UnknownType { name } => name,
        }
    }

    /// Longer explanation used by the human report.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        match self {
            Self::NoFixedPoint { item, passes, .. } => format!(
                "The variances of `{item}` depend on each other and were still changing after {passes} passes"
            ),
            Self::UnknownType { name } => {
                format!("`{name}` is neither a built-in constructor nor defined in this unit")
            }
        }
    }
}
