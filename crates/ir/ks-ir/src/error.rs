//! Errors raised while reading and lowering IR.

use ks_span::{ErrorKind, FileSpan};
use thiserror::Error;

/// Result type for IR lowering.
pub type IrResult<T> = Result<T, Vec<IrError>>;

/// Malformed IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    /// The JSON document itself could not be decoded.
    #[error("invalid IR document: {message}")]
    Decode {
        /// Decoder message
        message: String,
    },

    /// A textual type, place or region failed to parse.
    #[error("cannot parse {what} `{text}`")]
    Syntax {
        /// What was being parsed ("type", "place", ...)
        what: &'static str,
        /// The offending text
        text: String,
        /// Where the text appeared
        span: FileSpan,
    },

    /// A region name is not declared by the enclosing item.
    #[error("undeclared region `'{name}` in `{item}`")]
    UnknownRegion {
        /// Region name
        name: String,
        /// Enclosing item
        item: String,
        /// Where it was used
        span: FileSpan,
    },

    /// A type parameter name is not declared by the enclosing item.
    #[error("undeclared type parameter `{name}` in `{item}`")]
    UnknownTypeParam {
        /// Parameter name
        name: String,
        /// Enclosing item
        item: String,
        /// Where it was used
        span: FileSpan,
    },

    /// A type name that is neither a primitive, a built-in constructor,
    /// a type parameter in scope nor a definition in the unit.
    #[error("unknown type `{name}` in `{item}`")]
    UnknownType {
        /// Type name
        name: String,
        /// Enclosing item
        item: String,
        /// Where the name appeared
        span: FileSpan,
    },

    /// A type constructor was applied to the wrong number of arguments.
    #[error("`{name}` expects {expected} {what} argument(s), found {found}")]
    Arity {
        /// Constructor name
        name: String,
        /// "region" or "type"
        what: &'static str,
        /// Declared count
        expected: usize,
        /// Supplied count
        found: usize,
        /// Where it was used
        span: FileSpan,
    },

    /// Two items, fields or locals share a name.
    #[error("duplicate {what} `{name}`")]
    Duplicate {
        /// What kind of thing is duplicated
        what: &'static str,
        /// The name
        name: String,
        /// Location of the second definition
        span: FileSpan,
    },

    /// An unknown op or field value.
    #[error("invalid {what} `{value}`")]
    InvalidValue {
        /// What was being decoded
        what: &'static str,
        /// The value
        value: String,
        /// Where it appeared
        span: FileSpan,
    },
}

impl IrError {
    /// Returns the primary source location for this error.
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Decode { .. } => FileSpan::synthetic(),
            Self::Syntax { span, .. }
            | Self::UnknownRegion { span, .. }
            | Self::UnknownTypeParam { span, .. }
            | Self::UnknownType { span, .. }
            | Self::Arity { span, .. }
            | Self::Duplicate { span, .. }
            | Self::InvalidValue { span, .. } => *span,
        }
    }

    /// Diagnostic category; malformed input is always fatal for the unit.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedIrError
    }

    /// Name of the enclosing item, when the error is tied to one.
    #[must_use]
    pub fn item(&self) -> Option<&str> {
        match self {
            Self::UnknownRegion { item, .. }
            | Self::UnknownTypeParam { item, .. }
            | Self::UnknownType { item, .. } => Some(item),
            Self::Duplicate { name, .. } => Some(name),
            Self::Decode { .. }
            | Self::Syntax { .. }
            | Self::Arity { .. }
            | Self::InvalidValue { .. } => None,
        }
    }
}
