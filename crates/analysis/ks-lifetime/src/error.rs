//! Elision and signature validation errors.

use ks_region::RegionError;
use ks_span::{ErrorKind, FileSpan};
use miette::Diagnostic;
use thiserror::Error;

/// Result type for elision.
pub type ElisionResult<T> = Result<T, ElisionError>;

/// Errors raised while eliding or validating region annotations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ElisionError {
    /// An elided output region has no unique input region to borrow from.
    #[error("missing region specifier in `{item}`: {inputs} input regions and no receiver")]
    #[diagnostic(
        code(kestrel::ambiguous_elision),
        help("name the region the result borrows from, e.g. `fn f<'a>(x: &'a T, ..) -> &'a U`")
    )]
    Ambiguous {
        /// Function or type being elided
        item: String,
        /// Number of distinct input regions
        inputs: usize,
        /// Item span
        span: FileSpan,
    },

    /// A field type has an elided region but the struct does not declare
    /// exactly one region parameter.
    #[error("cannot elide region in field `{field}` of `{item}`: {params} region parameters")]
    #[diagnostic(
        code(kestrel::ambiguous_elision),
        help("write the region parameter explicitly in the field type")
    )]
    AmbiguousField {
        /// Type constructor
        item: String,
        /// Field name
        field: String,
        /// Number of region parameters
        params: usize,
        /// Type span
        span: FileSpan,
    },

    /// An output region is not reachable from any input region.
    #[error("output region `{region}` of `{item}` does not come from any input")]
    #[diagnostic(
        code(kestrel::unbounded_output),
        help("tie `{region}` to an input, or spell it `'unbounded` if it is deliberately unconstrained")
    )]
    UnboundedOutput {
        /// Function
        item: String,
        /// Offending region with quote
        region: String,
        /// Item span
        span: FileSpan,
    },

    /// Fresh regions could not be added to the region graph.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Region(#[from] RegionError),
}

impl ElisionError {
    /// Returns the primary source location for this error.
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Ambiguous { span, .. }
            | Self::AmbiguousField { span, .. }
            | Self::UnboundedOutput { span, .. } => *span,
            Self::Region(err) => err.span(),
        }
    }

    /// Diagnostic category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ambiguous { .. } | Self::AmbiguousField { .. } => ErrorKind::AmbiguousElisionError,
            Self::UnboundedOutput { .. } => ErrorKind::UnboundedOutputError,
            Self::Region(err) => err.kind(),
        }
    }

    /// Name of the item the error belongs to.
    #[must_use]
    pub fn item(&self) -> Option<&str> {
        match self {
            Self::Ambiguous { item, .. }
            | Self::AmbiguousField { item, .. }
            | Self::UnboundedOutput { item, .. } => Some(item),
            Self::Region(err) => err.item(),
        }
    }

    /// Longer explanation used by the human report.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        match self {
            Self::Ambiguous { item, inputs, .. } => format!(
                "`{item}` returns a reference with an elided region, but there are {inputs} candidate input regions and no receiver to pick from"
            ),
            Self::AmbiguousField { item, field, params, .. } => format!(
                "Field `{field}` of `{item}` omits its region, which is only allowed when the type declares exactly one region parameter (it declares {params})"
            ),
            Self::UnboundedOutput { item, region, .. } => format!(
                "Nothing passed to `{item}` is known to outlive `{region}`, so callers cannot tell how long the result is valid"
            ),
            Self::Region(err) => err.detailed_message(),
        }
    }
}
