//! Fresh region names for elision.

use ks_intern::{Interner, Symbol};
use ks_ir::{RegionRef, Ty};
use rustc_hash::FxHashSet;

/// Hands out region names that do not clash with names already in use by
/// an item.
///
/// Names run `'a`, `'b`, ..., `'z`, then `'a1`, `'b1`, ...
#[derive(Debug)]
pub struct ElisionContext<'i> {
    interner: &'i Interner,
    taken: FxHashSet<Symbol>,
    fresh: Vec<Symbol>,
    next: u32,
}

impl<'i> ElisionContext<'i> {
    /// Creates a context with no reserved names.
    #[must_use]
    pub fn new(interner: &'i Interner) -> Self {
        Self {
            interner,
            taken: FxHashSet::default(),
            fresh: Vec::new(),
            next: 0,
        }
    }

    /// Reserves a name so it is never handed out.
    pub fn reserve(&mut self, name: Symbol) {
        self.taken.insert(name);
    }

    /// Reserves every named region in `ty`.
    pub fn reserve_in(&mut self, ty: &Ty) {
        ty.visit_regions(&mut |region| {
            if let RegionRef::Named(name) = region {
                self.taken.insert(name);
            }
        });
    }

    /// Creates a fresh region.
    pub fn fresh_region(&mut self) -> RegionRef {
        loop {
            let letter = char::from(b'a' + (self.next % 26) as u8);
            let round = self.next / 26;
            self.next += 1;
            let name = if round == 0 {
                letter.to_string()
            } else {
                format!("{letter}{round}")
            };
            let sym = self.interner.intern(&name);
            if self.taken.insert(sym) {
                self.fresh.push(sym);
                return RegionRef::Named(sym);
            }
        }
    }

    /// Regions created so far, in creation order.
    #[must_use]
    pub fn fresh(&self) -> &[Symbol] {
        &self.fresh
    }

    /// Consumes the context, returning the created regions.
    #[must_use]
    pub fn into_fresh(self) -> Vec<Symbol> {
        self.fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_names_skip_taken() {
        let interner = Interner::new();
        let mut ctx = ElisionContext::new(&interner);
        ctx.reserve(interner.intern("a"));
        ctx.reserve(interner.intern("c"));

        let names: Vec<String> = (0..3)
            .map(|_| match ctx.fresh_region() {
                RegionRef::Named(name) => interner.resolve(&name).to_string(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(names, ["b", "d", "e"]);
        assert_eq!(ctx.fresh().len(), 3);
    }
}
