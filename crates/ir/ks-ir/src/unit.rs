//! One compilation unit of elaborated IR.

use indexmap::IndexMap;
use ks_intern::{Interner, Symbol};
use ks_span::{FileId, FileSpan};

use crate::item::{FnDef, TypeDef};
use crate::place::Place;

/// Request to treat two places of one function as non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequest {
    /// Function the request applies to
    pub function: Symbol,
    /// First place
    pub left: Place,
    /// Second place
    pub right: Place,
    /// Source location
    pub span: FileSpan,
}

/// An elaborated compilation unit.
///
/// Type definitions and functions keep their declaration order so that
/// diagnostics come out in a stable order.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Unit name
    pub name: String,
    /// File the unit was produced from
    pub file: FileId,
    /// Interner owning every name in the unit
    pub interner: Interner,
    /// Type constructor definitions
    pub type_defs: IndexMap<Symbol, TypeDef>,
    /// Function definitions
    pub functions: IndexMap<Symbol, FnDef>,
    /// Disjointness proof requests for split operations
    pub proof_requests: Vec<ProofRequest>,
}

impl CompilationUnit {
    /// Creates an empty unit.
    #[must_use]
    pub fn new(name: impl Into<String>, interner: Interner) -> Self {
        Self {
            name: name.into(),
            file: FileId::default(),
            interner,
            type_defs: IndexMap::new(),
            functions: IndexMap::new(),
            proof_requests: Vec::new(),
        }
    }

    /// Resolves a symbol to its string.
    #[must_use]
    pub fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(&sym)
    }

    /// Looks up a type definition by name.
    #[must_use]
    pub fn type_def(&self, name: Symbol) -> Option<&TypeDef> {
        self.type_defs.get(&name)
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: Symbol) -> Option<&FnDef> {
        self.functions.get(&name)
    }

    /// Proof requests attached to one function.
    pub fn proofs_for(&self, function: Symbol) -> impl Iterator<Item = &ProofRequest> + '_ {
        self.proof_requests
            .iter()
            .filter(move |request| request.function == function)
    }
}
