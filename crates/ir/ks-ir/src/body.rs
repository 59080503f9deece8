//! Function bodies as sequences of place-level operations.

use ks_intern::Symbol;
use ks_span::FileSpan;

use crate::place::Place;
use crate::ty::Ty;

/// Kind of borrow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorrowKind {
    /// Shared borrow (`&T`)
    Shared,
    /// Mutable borrow (`&mut T`)
    Mutable,
}

impl BorrowKind {
    /// Returns `true` if this is a mutable borrow.
    #[must_use]
    pub fn is_mutable(self) -> bool {
        matches!(self, Self::Mutable)
    }

    /// Returns `true` if this is a shared borrow.
    #[must_use]
    pub fn is_shared(self) -> bool {
        matches!(self, Self::Shared)
    }
}

/// How a write affects the written place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// Plain assignment to the place
    Assign,
    /// Write that changes an enum's active variant
    SetDiscriminant,
}

/// Argument passed to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A loan handle (a reference value)
    Handle(Symbol),
    /// A plain value that carries no loans
    Value,
}

/// A local variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    /// Local name
    pub name: Symbol,
    /// Declared type
    pub ty: Ty,
    /// Whether the binding is mutable
    pub mutable: bool,
    /// Whether this local is a function parameter
    pub param: bool,
    /// Element count, for sequential containers
    pub len: Option<u64>,
}

/// A body operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// Open a nested lexical scope
    EnterScope,
    /// Close the innermost scope, dropping its locals and handles
    ExitScope,
    /// Bring a declared local into the current scope
    Bind {
        /// The local
        local: Symbol,
    },
    /// End a local's storage before its scope ends
    Drop {
        /// The local
        local: Symbol,
    },
    /// Read a place
    Read {
        /// The place read
        place: Place,
    },
    /// Write a place
    Write {
        /// The place written
        place: Place,
        /// Plain assignment or discriminant change
        kind: WriteKind,
    },
    /// Acquire a shared or mutable loan, binding it to `handle`
    Borrow {
        /// Handle naming the new reference value
        handle: Symbol,
        /// Borrowed place
        place: Place,
        /// Shared or mutable
        kind: BorrowKind,
        /// Explicit region the loan must live for
        region: Option<Symbol>,
    },
    /// Duplicate a handle
    Copy {
        /// New handle
        handle: Symbol,
        /// Existing handle
        from: Symbol,
    },
    /// Park a handle's loans in a place; they live as long as its local
    Store {
        /// Stored handle
        handle: Symbol,
        /// Destination place
        into: Place,
    },
    /// Drop a handle
    Release {
        /// The handle
        handle: Symbol,
    },
    /// Call a function
    Call {
        /// Callee name
        callee: Symbol,
        /// Arguments in parameter order
        args: Vec<Operand>,
        /// Handle receiving the result, if the result is kept
        dest: Option<Symbol>,
    },
    /// Return from the function
    Return {
        /// Returned handle, if the return value carries loans
        value: Option<Symbol>,
    },
    /// Split a mutable loan on a sequential container at `at`
    Split {
        /// Consumed mutable handle
        source: Symbol,
        /// Split index
        at: u64,
        /// Handle for `[0, at)`
        left: Symbol,
        /// Handle for `[at, len)`
        right: Symbol,
        /// Region the halves are re-bounded to, defaults to the source's
        region: Option<Symbol>,
    },
    /// Turn a mutable handle into an element iterator
    Iter {
        /// Iterator name
        iter: Symbol,
        /// Consumed mutable handle
        source: Symbol,
        /// Whether each step yields a loan disjoint from all others
        one_shot: bool,
    },
    /// Advance an iterator, binding the yielded element loan
    Advance {
        /// Iterator name
        iter: Symbol,
        /// Handle receiving the element loan
        output: Symbol,
    },
    /// Access the backing store through the iterator itself
    Expose {
        /// Iterator name
        iter: Symbol,
        /// Shared or mutable access
        kind: BorrowKind,
    },
}

/// A body operation with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    /// What the operation does
    pub kind: OpKind,
    /// Source location
    pub span: FileSpan,
}

/// A function body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Body {
    /// Declared locals, parameters first
    pub locals: Vec<LocalDecl>,
    /// Operations in program order
    pub ops: Vec<Op>,
}

impl Body {
    /// Looks up a local declaration.
    #[must_use]
    pub fn local(&self, name: Symbol) -> Option<&LocalDecl> {
        self.locals.iter().find(|local| local.name == name)
    }
}
