//! Region graph errors.

use ks_span::{ErrorKind, FileSpan};
use miette::Diagnostic;
use thiserror::Error;

/// Result type for region graph operations.
pub type RegionResult<T> = Result<T, RegionError>;

/// Errors raised while building the region graph.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum RegionError {
    /// An outlives bound would close a cycle.
    #[error("outlives bounds in `{item}` form a cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(
        code(kestrel::region_cycle),
        help("outlives bounds must form a partial order; drop one of the bounds")
    )]
    Cycle {
        /// Item declaring the offending bound
        item: String,
        /// Regions on the cycle, starting and ending at the same region
        cycle: Vec<String>,
        /// Declaration span
        span: FileSpan,
    },

    /// A region was declared twice in one scope.
    #[error("region `{name}` is declared twice in `{item}`")]
    #[diagnostic(code(kestrel::duplicate_region))]
    Duplicate {
        /// Region name
        name: String,
        /// Item declaring it
        item: String,
        /// Declaration span
        span: FileSpan,
    },

    /// The graph was mutated after sealing.
    #[error("region graph is sealed; cannot add `{name}`")]
    #[diagnostic(code(kestrel::region_graph_sealed))]
    Sealed {
        /// Region being added
        name: String,
    },
}

impl RegionError {
    /// Returns the primary source location for this error.
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Cycle { span, .. } | Self::Duplicate { span, .. } => *span,
            Self::Sealed { .. } => FileSpan::synthetic(),
        }
    }

    /// Diagnostic category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cycle { .. } => ErrorKind::CycleError,
            Self::Duplicate { .. } | Self::Sealed { .. } => ErrorKind::MalformedIrError,
        }
    }

    /// Name of the item the error belongs to, if any.
    #[must_use]
    pub fn item(&self) -> Option<&str> {
        match self {
            Self::Cycle { item, .. } | Self::Duplicate { item, .. } => Some(item),
            Self::Sealed { .. } => None,
        }
    }

    /// Longer explanation used by the human report.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        match self {
            Self::Cycle { item, cycle, .. } => format!(
                "The bounds declared by `{item}` require each of {} to outlive the next, which only holds if they are all the same region",
                cycle.join(", ")
            ),
            Self::Duplicate { name, item, .. } => {
                format!("`{item}` declares the region `{name}` more than once")
            }
            Self::Sealed { name } => {
                format!("Region `{name}` was added after borrow checking began")
            }
        }
    }
}
