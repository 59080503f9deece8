//! Structural subtyping for types with explicit regions.

use ks_ir::{Mutability, RegionRef, Ty};
use ks_region::{RegionGraph, RegionScope};

use crate::engine::VarianceTable;
use crate::variance::Variance;

/// Answers `sub <: sup` queries inside one item's region scope.
pub struct Subtyping<'a> {
    graph: &'a RegionGraph,
    table: &'a VarianceTable,
    scope: RegionScope,
}

impl<'a> Subtyping<'a> {
    /// Creates a relation over `graph` using `table` for user constructors.
    #[must_use]
    pub fn new(graph: &'a RegionGraph, table: &'a VarianceTable, scope: RegionScope) -> Self {
        Self {
            graph,
            table,
            scope,
        }
    }

    /// Whether `sub` is a subtype of `sup`.
    ///
    /// Elided regions never relate; `'unbounded` relates to everything.
    #[must_use]
    pub fn is_subtype(&self, sub: &Ty, sup: &Ty) -> bool {
        self.relate(sub, sup, Variance::Covariant)
    }

    fn relate(&self, a: &Ty, b: &Ty, variance: Variance) -> bool {
        match variance {
            Variance::Bivariant => true,
            Variance::Covariant => self.sub(a, b),
            Variance::Contravariant => self.sub(b, a),
            Variance::Invariant => self.sub(a, b) && self.sub(b, a),
        }
    }

    fn relate_regions(&self, a: RegionRef, b: RegionRef, variance: Variance) -> bool {
        match variance {
            Variance::Bivariant => true,
            Variance::Covariant => self.region_outlives(a, b),
            Variance::Contravariant => self.region_outlives(b, a),
            Variance::Invariant => self.region_outlives(a, b) && self.region_outlives(b, a),
        }
    }

    fn region_outlives(&self, a: RegionRef, b: RegionRef) -> bool {
        let resolve = |region: RegionRef| match region {
            RegionRef::Named(name) => self.graph.region_by_name(self.scope, name),
            RegionRef::Static => Some(self.graph.static_region()),
            RegionRef::Elided | RegionRef::Unbounded => None,
        };
        if matches!(a, RegionRef::Unbounded) || matches!(b, RegionRef::Unbounded) {
            return true;
        }
        match (resolve(a), resolve(b)) {
            (Some(a), Some(b)) => self.graph.is_subtype_region(a, b),
            _ => false,
        }
    }

    fn sub(&self, a: &Ty, b: &Ty) -> bool {
        match (a, b) {
            (Ty::Prim(x), Ty::Prim(y)) | (Ty::Param(x), Ty::Param(y)) => x == y,
            (
                Ty::Ref {
                    region: ra,
                    mutability: ma,
                    target: ta,
                },
                Ty::Ref {
                    region: rb,
                    mutability: mb,
                    target: tb,
                },
            ) => {
                ma == mb
                    && self.region_outlives(*ra, *rb)
                    && self.relate(ta, tb, pointee(*ma))
            }
            (
                Ty::RawPtr {
                    mutability: ma,
                    target: ta,
                },
                Ty::RawPtr {
                    mutability: mb,
                    target: tb,
                },
            ) => ma == mb && self.relate(ta, tb, pointee(*ma)),
            (Ty::Slice(ea), Ty::Slice(eb)) => self.sub(ea, eb),
            (Ty::Array(ea, la), Ty::Array(eb, lb)) => la == lb && self.sub(ea, eb),
            (Ty::Tuple(xs), Ty::Tuple(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.sub(x, y))
            }
            (
                Ty::FnPtr {
                    inputs: ia,
                    output: oa,
                },
                Ty::FnPtr {
                    inputs: ib,
                    output: ob,
                },
            ) => {
                ia.len() == ib.len()
                    && ia
                        .iter()
                        .zip(ib)
                        .all(|(x, y)| self.relate(x, y, Variance::Contravariant))
                    && self.sub(oa, ob)
            }
            (
                Ty::Adt {
                    name: na,
                    regions: ra,
                    args: aa,
                },
                Ty::Adt {
                    name: nb,
                    regions: rb,
                    args: ab,
                },
            ) => {
                na == nb
                    && ra.len() == rb.len()
                    && aa.len() == ab.len()
                    && ra.iter().zip(rb).enumerate().all(|(idx, (x, y))| {
                        self.relate_regions(*x, *y, self.table.region_param_variance(*na, idx))
                    })
                    && aa.iter().zip(ab).enumerate().all(|(idx, (x, y))| {
                        self.relate(x, y, self.table.type_param_variance(*na, idx))
                    })
            }
            _ => false,
        }
    }
}

fn pointee(mutability: Mutability) -> Variance {
    match mutability {
        Mutability::Shared => Variance::Covariant,
        Mutability::Mut => Variance::Invariant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VarianceEngine;
    use ks_intern::Interner;
    use ks_ir::{lower_json, syntax::parse_ty};

    #[test]
    fn test_subtyping_through_references_and_cells() {
        let unit = lower_json(
            r#"{
                "types": [{"name": "Cellish", "regions": ["'a"], "fields": [{"name": "c", "ty": "Cell<&'a u8>"}]}],
                "functions": [{"name": "f", "regions": ["'long", "'short", "'x: 'long"]}]
            }"#,
            &Interner::new(),
        )
        .unwrap_or_else(|errors| panic!("{errors:?}"));
        let (graph, errors) = RegionGraph::from_unit(&unit);
        assert!(errors.is_empty());
        let solution = VarianceEngine::new(&unit).solve();
        let scope = RegionScope::Function(unit.interner.intern("f"));
        let rel = Subtyping::new(&graph, &solution.table, scope);
        let ty = |text: &str| parse_ty(text, &unit.interner).unwrap_or_else(|| panic!("{text}"));

        assert!(rel.is_subtype(&ty("&'x u8"), &ty("&'long u8")));
        assert!(!rel.is_subtype(&ty("&'long u8"), &ty("&'x u8")));
        assert!(rel.is_subtype(&ty("&'static u8"), &ty("&'short u8")));
        assert!(!rel.is_subtype(&ty("&'long mut &'x u8"), &ty("&'long mut &'long u8")));
        assert!(rel.is_subtype(&ty("fn(&'long u8)"), &ty("fn(&'x u8)")));
        assert!(!rel.is_subtype(&ty("Cellish<'x>"), &ty("Cellish<'long>")));
        assert!(rel.is_subtype(&ty("Cellish<'x>"), &ty("Cellish<'x>")));
    }
}
