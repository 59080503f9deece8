//! Borrow checking errors.

use ks_span::{ErrorKind, FileSpan};
use miette::Diagnostic;
use thiserror::Error;

/// Result type for borrow checking: every independent error of a unit.
pub type BorrowResult<T> = Result<T, Vec<BorrowError>>;

/// Errors raised while walking function bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum BorrowError {
    /// An access or new loan overlaps a live loan it is not compatible with.
    #[error("cannot {access} `{place}` because it is {state}")]
    #[diagnostic(
        code(kestrel::borrow_conflict),
        help("the loan on `{loan_place}` is still held; release it before this access")
    )]
    Conflict {
        /// Function being checked
        function: String,
        /// What was attempted ("borrow as mutable", "write", ...)
        access: String,
        /// Place accessed
        place: String,
        /// Borrow state of the place at the access
        state: String,
        /// Place of the conflicting loan
        loan_place: String,
        /// Where the conflicting loan was taken
        loan_span: FileSpan,
        /// Access span
        span: FileSpan,
    },

    /// A lending iterator advanced while the previous element is still held.
    #[error("cannot advance `{iter}` while a previously yielded element is live")]
    #[diagnostic(
        code(kestrel::borrow_conflict),
        help("a lending iterator reuses its storage; release the element before the next step")
    )]
    LendingAdvance {
        /// Function being checked
        function: String,
        /// Iterator name
        iter: String,
        /// Advance span
        span: FileSpan,
    },

    /// The backing store was reached through an iterator with elements live.
    #[error("cannot access the backing store of `{iter}` while a yielded element is live")]
    #[diagnostic(code(kestrel::borrow_conflict))]
    ExposeWhileYielded {
        /// Function being checked
        function: String,
        /// Iterator name
        iter: String,
        /// Expose span
        span: FileSpan,
    },

    /// A disjointness proof request could not be discharged.
    #[error("cannot prove `{left}` and `{right}` disjoint")]
    #[diagnostic(
        code(kestrel::borrow_conflict),
        help("no registered disjointness prover accepts this pair of places")
    )]
    Unproven {
        /// Function the request belongs to
        function: String,
        /// Left place
        left: String,
        /// Right place
        right: String,
        /// Request span
        span: FileSpan,
    },

    /// A one-shot type exposes a mutable reference through a public field.
    #[error("one-shot type `{item}` exposes a mutable reference through public field `{field}`")]
    #[diagnostic(
        code(kestrel::borrow_conflict),
        help("make `{field}` private; yielded loans are only unique if nothing else can reach them")
    )]
    ExposedOneShot {
        /// Type constructor
        item: String,
        /// Field name
        field: String,
        /// Type span
        span: FileSpan,
    },

    /// A function returns or stores a loan on one of its own locals.
    #[error("cannot return reference to local variable `{place}`")]
    #[diagnostic(
        code(kestrel::escaping_borrow),
        help("the local is dropped when `{function}` returns")
    )]
    Escaping {
        /// Function being checked
        function: String,
        /// Place of the escaping loan
        place: String,
        /// Return or store span
        span: FileSpan,
    },

    /// A borrow asks for a region longer than the borrowed data lives.
    #[error("borrow of `{place}` does not live long enough for `{region}`")]
    #[diagnostic(code(kestrel::escaping_borrow))]
    ShortLived {
        /// Function being checked
        function: String,
        /// Borrowed place
        place: String,
        /// Requested region
        region: String,
        /// Borrow span
        span: FileSpan,
    },

    /// A returned loan's region does not outlive any output region.
    #[error("returned loan on `{place}` lives for `{region}`, which outlives no output region")]
    #[diagnostic(
        code(kestrel::unbounded_output),
        help("add an outlives bound from `{region}` to the output region")
    )]
    UnboundedReturn {
        /// Function being checked
        function: String,
        /// Place of the returned loan
        place: String,
        /// Region of the loan
        region: String,
        /// Return span
        span: FileSpan,
    },

    /// Split halves were re-bounded to a region the source does not outlive.
    #[error("cannot re-bound split of `{place}` to `{region}`")]
    #[diagnostic(
        code(kestrel::unbounded_output),
        help("the source loan must outlive the region its halves are re-bounded to")
    )]
    SplitRegion {
        /// Function being checked
        function: String,
        /// Split place
        place: String,
        /// Requested region
        region: String,
        /// Split span
        span: FileSpan,
    },

    /// A split index lies past the end of the container.
    #[error("cannot split `{place}` at {at}: length is {len}")]
    #[diagnostic(code(kestrel::malformed_ir))]
    SplitOutOfBounds {
        /// Function being checked
        function: String,
        /// Split place
        place: String,
        /// Requested split index
        at: u64,
        /// Container length
        len: u64,
        /// Split span
        span: FileSpan,
    },

    /// The body refers to something that does not exist.
    #[error("malformed body of `{function}`: {message}")]
    #[diagnostic(code(kestrel::malformed_ir))]
    Malformed {
        /// Function being checked
        function: String,
        /// What is wrong
        message: String,
        /// Operation span
        span: FileSpan,
    },
}

impl BorrowError {
    /// Returns the primary source location for this error.
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Conflict { span, .. }
            | Self::LendingAdvance { span, .. }
            | Self::ExposeWhileYielded { span, .. }
            | Self::Unproven { span, .. }
            | Self::ExposedOneShot { span, .. }
            | Self::Escaping { span, .. }
            | Self::ShortLived { span, .. }
            | Self::UnboundedReturn { span, .. }
            | Self::SplitRegion { span, .. }
            | Self::SplitOutOfBounds { span, .. }
            | Self::Malformed { span, .. } => *span,
        }
    }

    /// Diagnostic category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. }
            | Self::LendingAdvance { .. }
            | Self::ExposeWhileYielded { .. }
            | Self::Unproven { .. }
            | Self::ExposedOneShot { .. } => ErrorKind::BorrowConflictError,
            Self::Escaping { .. } | Self::ShortLived { .. } => ErrorKind::EscapingBorrowError,
            Self::UnboundedReturn { .. } | Self::SplitRegion { .. } => {
                ErrorKind::UnboundedOutputError
            }
            Self::SplitOutOfBounds { .. } | Self::Malformed { .. } => ErrorKind::MalformedIrError,
        }
    }

    /// Name of the function (or type, for definition-time checks).
    #[must_use]
    pub fn item(&self) -> &str {
        match self {
            Self::ExposedOneShot { item, .. } => item,
            Self::Conflict { function, .. }
            | Self::LendingAdvance { function, .. }
            | Self::ExposeWhileYielded { function, .. }
            | Self::Unproven { function, .. }
            | Self::Escaping { function, .. }
            | Self::ShortLived { function, .. }
            | Self::UnboundedReturn { function, .. }
            | Self::SplitRegion { function, .. }
            | Self::SplitOutOfBounds { function, .. }
            | Self::Malformed { function, .. } => function,
        }
    }

    /// Returns a detailed message explaining the error.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        match self {
            Self::Conflict {
                access,
                place,
                state,
                loan_place,
                loan_span,
                ..
            } => format!(
                "Cannot {access} `{place}` because it is {state}; the loan on `{loan_place}` taken at {loan_span} is still live"
            ),
            Self::LendingAdvance { iter, .. } => format!(
                "Iterator `{iter}` lends each element from storage it reuses, so the previous element must be released before advancing"
            ),
            Self::ExposeWhileYielded { iter, .. } => format!(
                "Accessing the store behind `{iter}` would alias an element it already handed out"
            ),
            Self::Unproven { left, right, .. } => {
                format!("No disjointness prover could show that `{left}` and `{right}` do not overlap")
            }
            Self::ExposedOneShot { item, field, .. } => format!(
                "Public field `{field}` lets code outside `{item}` reach the loan its one-shot elements are carved from"
            ),
            Self::Escaping { place, function, .. } => {
                format!("`{place}` is owned by `{function}` and is dropped when it returns")
            }
            Self::ShortLived { place, region, .. } => {
                format!("`{place}` is not guaranteed to be valid for all of `{region}`")
            }
            Self::UnboundedReturn { place, region, .. } => format!(
                "The loan on `{place}` is only valid for `{region}`, and `{region}` is not known to outlive the returned type"
            ),
            Self::SplitRegion { place, region, .. } => {
                format!("The loan on `{place}` is not known to outlive `{region}`")
            }
            Self::SplitOutOfBounds { place, at, len, .. } => {
                format!("Split index {at} is past the end of `{place}` ({len} elements)")
            }
            Self::Malformed { message, .. } => message.clone(),
        }
    }
}
