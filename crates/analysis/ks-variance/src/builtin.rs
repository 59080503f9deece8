//! Fixed variances of built-in constructors.

use ks_intern::{Interner, Symbol};
use rustc_hash::FxHashMap;

use crate::variance::Variance;

/// Covariant owning and phantom constructors.
const COVARIANT: &[&str] = &["Box", "Vec", "Option", "PhantomData"];

/// Runtime-checked cells; invariant in their contents.
const INVARIANT: &[&str] = &["Cell", "RefCell", "UnsafeCell", "Mutex", "RwLock"];

/// Variance of the single type argument of each built-in constructor.
///
/// References, raw pointers and `fn` pointers are structural and handled
/// where types are walked.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    table: FxHashMap<Symbol, Variance>,
}

impl Builtins {
    /// Interns the built-in names.
    #[must_use]
    pub fn new(interner: &Interner) -> Self {
        let covariant = COVARIANT
            .iter()
            .map(|name| (interner.intern(name), Variance::Covariant));
        let invariant = INVARIANT
            .iter()
            .map(|name| (interner.intern(name), Variance::Invariant));
        Self {
            table: covariant.chain(invariant).collect(),
        }
    }

    /// Variance of `name`'s type argument. Unknown constructors are
    /// treated as invariant.
    #[must_use]
    pub fn variance(&self, name: Symbol) -> Variance {
        self.table
            .get(&name)
            .copied()
            .unwrap_or(Variance::Invariant)
    }
}
