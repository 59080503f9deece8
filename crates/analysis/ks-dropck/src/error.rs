//! Drop check errors.

use ks_span::{ErrorKind, FileSpan};
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by the drop check.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum DropError {
    /// A destructor touches type parameters its type does not own.
    #[error("destructor of `{item}` accesses {}, which `{item}` does not own", list(.missing))]
    #[diagnostic(
        code(kestrel::unsound_drop),
        help("store the parameter by value, add a `PhantomData<T>` field, or list it in `owns`")
    )]
    Unsound {
        /// Type constructor
        item: String,
        /// Accessed but unowned type parameters
        missing: Vec<String>,
        /// Span of the destructor
        span: FileSpan,
    },
}

fn list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl DropError {
    /// Returns the primary source location for this error.
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Unsound { span, .. } => *span,
        }
    }

    /// Diagnostic category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::UnsoundDropError
    }

    /// Name of the offending type.
    #[must_use]
    pub fn item(&self) -> &str {
        match self {
            Self::Unsound { item, .. } => item,
        }
    }

    /// Returns a detailed message explaining the error.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        match self {
            Self::Unsound { item, missing, .. } => format!(
                "`{item}` may be dropped after values of {} are gone, yet its destructor reads them",
                list(missing)
            ),
        }
    }
}
