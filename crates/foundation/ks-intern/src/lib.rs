//! String interning for region, parameter, field and local names

pub use lasso::Spur as Symbol;
use lasso::ThreadedRodeo;
use std::fmt;
use std::sync::Arc;

/// Shared string interner.
///
/// Cloning is cheap; every clone resolves the same symbols.
#[derive(Clone)]
pub struct Interner {
    inner: Arc<ThreadedRodeo>,
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ThreadedRodeo::new()),
        }
    }

    /// Interns `s`, returning the existing symbol if it was seen before.
    pub fn intern(&self, s: &str) -> Symbol {
        self.inner.get_or_intern(s)
    }

    /// Looks up an already interned string without inserting it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.inner.get(s)
    }

    /// Resolves a symbol produced by this interner.
    pub fn resolve(&self, sym: &Symbol) -> &str {
        self.inner.resolve(sym)
    }

    /// Resolves a symbol that may come from a different interner.
    pub fn try_resolve(&self, sym: &Symbol) -> Option<&str> {
        self.inner.try_resolve(sym)
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner")
            .field("symbols", &self.inner.len())
            .finish()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_symbols() {
        let interner = Interner::new();
        let other = interner.clone();
        let sym = interner.intern("'a");
        assert_eq!(other.intern("'a"), sym);
        assert_eq!(other.resolve(&sym), "'a");
        assert!(other.get("'b").is_none());
    }
}
