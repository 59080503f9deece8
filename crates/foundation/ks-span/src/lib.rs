//! Source spans and diagnostic locations for IR items.
//!
//! The analyzer never sees source text; spans are carried through from
//! whatever front-end produced the IR so diagnostics can point back at it.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// A unique identifier for a source file
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize, Display)]
#[display("file#{_0}")]
pub struct FileId(pub u32);

impl FileId {
    /// Creates a file identifier.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A byte offset span in a source file
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: u32,
    /// End offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Creates a span; `end` is clamped so the span is never inverted.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Byte range covered by the span.
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A span with associated file
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileSpan {
    /// File the span belongs to
    pub file: FileId,
    /// Byte range inside the file
    pub span: Span,
}

impl FileSpan {
    /// Creates a file span.
    pub fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }

    /// Placeholder span for items that were built without source information.
    pub fn synthetic() -> Self {
        Self::default()
    }

    /// Byte range covered by the span.
    pub fn range(&self) -> Range<usize> {
        self.span.range()
    }
}

impl fmt::Display for FileSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.file, self.span.start, self.span.end)
    }
}

/// Where a diagnostic points inside a compilation unit.
///
/// `item` names a type definition or function; `op` is the index of the
/// body operation for diagnostics raised while walking a function body.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Name of the enclosing item
    pub item: String,
    /// Index of the offending body operation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<usize>,
    /// Source span carried through from the front-end
    pub span: FileSpan,
}

impl Location {
    /// Location of a whole item (type definition or signature).
    pub fn item(item: impl Into<String>, span: FileSpan) -> Self {
        Self {
            item: item.into(),
            op: None,
            span,
        }
    }

    /// Location of one operation inside a function body.
    pub fn op(item: impl Into<String>, op: usize, span: FileSpan) -> Self {
        Self {
            item: item.into(),
            op: Some(op),
            span,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Some(op) => write!(f, "{}#{op}", self.item),
            None => write!(f, "{}", self.item),
        }
    }
}

/// Category of a diagnostic, shared by every analysis pass.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Display)]
pub enum ErrorKind {
    /// Region outlives cycle
    CycleError,
    /// Variance fixed point did not stabilize
    VarianceCycleError,
    /// Aliasing violation
    BorrowConflictError,
    /// Output region cannot be elided
    AmbiguousElisionError,
    /// Output region not traceable to an input
    UnboundedOutputError,
    /// Destructor accesses a parameter the type does not own
    UnsoundDropError,
    /// Loan on a local outlives the function
    EscapingBorrowError,
    /// IR names something that does not exist or fails to parse
    MalformedIrError,
    /// Type parameter never used (warning only)
    UnusedParameter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_span_is_clamped() {
        let span = Span::new(10, 4);
        assert!(span.is_empty());
        assert_eq!(span.range(), 10..10);
    }

    #[test]
    fn test_location_display() {
        let span = FileSpan::synthetic();
        assert_eq!(Location::item("Foo", span).to_string(), "Foo");
        assert_eq!(Location::op("main", 3, span).to_string(), "main#3");
    }
}
