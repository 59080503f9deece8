//! Fixed-point variance inference over a unit's type constructors.

use indexmap::IndexMap;
use ks_intern::Symbol;
use ks_ir::{CompilationUnit, GenericParam, Mutability, ParamKind, RegionRef, Ty, TypeDef};
use rustc_hash::FxHashMap;
use tracing::{debug, instrument, trace};

use crate::builtin::Builtins;
use crate::error::VarianceError;
use crate::variance::Variance;

/// Default bound on full passes over the unit.
pub const DEFAULT_ITERATION_CAP: usize = 64;

/// Variance of each parameter of one type constructor, in declaration order
/// (region parameters first).
pub type Variances = IndexMap<GenericParam, Variance>;

/// Solved variances for every type constructor of a unit.
#[derive(Debug, Clone, Default)]
pub struct VarianceTable {
    types: IndexMap<Symbol, Variances>,
    builtins: Builtins,
}

/// Result of solving a unit: the table is always produced, even when some
/// constructors failed to converge.
#[derive(Debug, Clone)]
pub struct VarianceSolution {
    /// Solved variances
    pub table: VarianceTable,
    /// Constructors whose variances were still changing at the cap
    pub errors: Vec<VarianceError>,
}

/// Infers variances by iterating to a fixed point.
///
/// Every parameter starts at [`Variance::Bivariant`]. Each pass recomputes
/// a parameter's variance from its field uses, reading the current
/// estimate for other constructors, and lowers the estimate with
/// [`Variance::glb`].
pub struct VarianceEngine<'u> {
    unit: &'u CompilationUnit,
    cap: usize,
}

impl<'u> VarianceEngine<'u> {
    /// Creates an engine for `unit` with the default iteration cap.
    #[must_use]
    pub fn new(unit: &'u CompilationUnit) -> Self {
        Self {
            unit,
            cap: DEFAULT_ITERATION_CAP,
        }
    }

    /// Overrides the iteration cap.
    #[must_use]
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(1);
        self
    }

    /// Solves every type constructor of the unit.
    #[instrument(skip_all, fields(unit = %self.unit.name, cap = self.cap))]
    pub fn solve(self) -> VarianceSolution {
        let builtins = Builtins::new(&self.unit.interner);
        let mut table = VarianceTable {
            types: self
                .unit
                .type_defs
                .values()
                .map(|def| {
                    let params = def.params().map(|param| (param, Variance::Bivariant));
                    (def.name, params.collect())
                })
                .collect(),
            builtins,
        };

        let mut changed_last: Vec<Symbol> = Vec::new();
        for pass in 1..=self.cap {
            changed_last.clear();
            for def in self.unit.type_defs.values() {
                if table.refine(def) {
                    changed_last.push(def.name);
                }
            }
            trace!(pass, changed = changed_last.len(), "variance pass");
            if changed_last.is_empty() {
                debug!(passes = pass, "variance fixed point reached");
                return VarianceSolution {
                    table,
                    errors: Vec::new(),
                };
            }
        }

        let errors = changed_last
            .into_iter()
            .filter_map(|name| self.unit.type_def(name))
            .map(|def| VarianceError::NoFixedPoint {
                item: self.unit.name(def.name).to_string(),
                passes: self.cap,
                span: def.span,
            })
            .collect();
        VarianceSolution { table, errors }
    }
}

/// Computes the variances of one constructor of `unit`.
///
/// # Errors
///
/// Returns [`VarianceError::NoFixedPoint`] if `name` did not converge within
/// `cap` passes, or [`VarianceError::UnknownType`] if `unit` has no such
/// constructor.
pub fn compute_variance(
    unit: &CompilationUnit,
    name: Symbol,
    cap: usize,
) -> Result<Variances, VarianceError> {
    let VarianceSolution { table, errors } = VarianceEngine::new(unit).with_cap(cap).solve();
    let item = unit.name(name);
    if let Some(err) = errors.into_iter().find(|err| err.item() == item) {
        return Err(err);
    }
    table
        .variances_of(name)
        .cloned()
        .ok_or_else(|| VarianceError::UnknownType {
            name: item.to_string(),
        })
}

impl VarianceTable {
    /// Recomputes `def`'s variances from its fields; returns whether any
    /// estimate moved.
    fn refine(&mut self, def: &TypeDef) -> bool {
        let mut uses: FxHashMap<GenericParam, Variance> = FxHashMap::default();
        for field in def.fields() {
            self.walk(&field.ty, Variance::Covariant, &mut |param, variance| {
                let entry = uses.entry(param).or_insert(Variance::Bivariant);
                *entry = entry.glb(variance);
            });
        }

        let Some(current) = self.types.get_mut(&def.name) else {
            return false;
        };
        let mut changed = false;
        for (param, estimate) in current.iter_mut() {
            let computed = uses.get(param).copied().unwrap_or(Variance::Bivariant);
            let next = estimate.glb(computed);
            if next != *estimate {
                *estimate = next;
                changed = true;
            }
        }
        changed
    }

    /// Visits every parameter occurrence in `ty` with the variance of its
    /// position, given that `ty` itself sits at `ambient`.
    fn walk(&self, ty: &Ty, ambient: Variance, visit: &mut impl FnMut(GenericParam, Variance)) {
        match ty {
            Ty::Prim(_) => {}
            Ty::Param(name) => visit(
                GenericParam {
                    name: *name,
                    kind: ParamKind::Type,
                },
                ambient,
            ),
            Ty::Ref {
                region,
                mutability,
                target,
            } => {
                visit_region(*region, ambient, visit);
                self.walk(target, ambient.xform(pointee_variance(*mutability)), visit);
            }
            Ty::RawPtr { mutability, target } => {
                self.walk(target, ambient.xform(pointee_variance(*mutability)), visit);
            }
            Ty::Slice(elem) | Ty::Array(elem, _) => self.walk(elem, ambient, visit),
            Ty::Tuple(elems) => {
                for elem in elems {
                    self.walk(elem, ambient, visit);
                }
            }
            Ty::FnPtr { inputs, output } => {
                for input in inputs {
                    self.walk(input, ambient.xform(Variance::Contravariant), visit);
                }
                self.walk(output, ambient, visit);
            }
            Ty::Adt {
                name,
                regions,
                args,
            } => {
                for (idx, region) in regions.iter().enumerate() {
                    let declared = self.declared(*name, ParamKind::Region, idx);
                    visit_region(*region, ambient.xform(declared), visit);
                }
                for (idx, arg) in args.iter().enumerate() {
                    let declared = self.declared(*name, ParamKind::Type, idx);
                    self.walk(arg, ambient.xform(declared), visit);
                }
            }
        }
    }

    /// Variance of the `idx`-th parameter of `kind` of constructor `name`.
    fn declared(&self, name: Symbol, kind: ParamKind, idx: usize) -> Variance {
        if let Some(variances) = self.types.get(&name) {
            return variances
                .iter()
                .filter(|(param, _)| param.kind == kind)
                .nth(idx)
                .map_or(Variance::Invariant, |(_, variance)| *variance);
        }
        match kind {
            ParamKind::Type => self.builtins.variance(name),
            // Built-in constructors take no region arguments.
            ParamKind::Region => Variance::Invariant,
        }
    }

    /// Solved variances of constructor `name`.
    #[must_use]
    pub fn variances_of(&self, name: Symbol) -> Option<&Variances> {
        self.types.get(&name)
    }

    /// Every solved constructor, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Variances)> + '_ {
        self.types.iter().map(|(name, variances)| (*name, variances))
    }

    /// Variance of `region` throughout `ty`: the greatest lower bound of
    /// the variances of all its occurrences, bivariant when absent.
    #[must_use]
    pub fn variance_of_region_in(&self, ty: &Ty, region: RegionRef) -> Variance {
        let mut result = Variance::Bivariant;
        self.walk_regions(ty, Variance::Covariant, &mut |found, variance| {
            if found == region {
                result = result.glb(variance);
            }
        });
        result
    }

    /// Variance of type parameter `param` throughout `ty`.
    #[must_use]
    pub fn variance_of_param_in(&self, ty: &Ty, param: Symbol) -> Variance {
        let target = GenericParam {
            name: param,
            kind: ParamKind::Type,
        };
        let mut result = Variance::Bivariant;
        self.walk(ty, Variance::Covariant, &mut |found, variance| {
            if found == target {
                result = result.glb(variance);
            }
        });
        result
    }

    /// Visits every region occurrence in `ty` (`'static` included) with
    /// its position's variance.
    pub fn walk_regions(
        &self,
        ty: &Ty,
        ambient: Variance,
        visit: &mut impl FnMut(RegionRef, Variance),
    ) {
        match ty {
            Ty::Prim(_) | Ty::Param(_) => {}
            Ty::Ref {
                region,
                mutability,
                target,
            } => {
                visit(*region, ambient);
                self.walk_regions(target, ambient.xform(pointee_variance(*mutability)), visit);
            }
            Ty::RawPtr { mutability, target } => {
                self.walk_regions(target, ambient.xform(pointee_variance(*mutability)), visit);
            }
            Ty::Slice(elem) | Ty::Array(elem, _) => self.walk_regions(elem, ambient, visit),
            Ty::Tuple(elems) => {
                for elem in elems {
                    self.walk_regions(elem, ambient, visit);
                }
            }
            Ty::FnPtr { inputs, output } => {
                for input in inputs {
                    self.walk_regions(input, ambient.xform(Variance::Contravariant), visit);
                }
                self.walk_regions(output, ambient, visit);
            }
            Ty::Adt {
                name,
                regions,
                args,
            } => {
                for (idx, region) in regions.iter().enumerate() {
                    visit(*region, ambient.xform(self.declared(*name, ParamKind::Region, idx)));
                }
                for (idx, arg) in args.iter().enumerate() {
                    let declared = self.declared(*name, ParamKind::Type, idx);
                    self.walk_regions(arg, ambient.xform(declared), visit);
                }
            }
        }
    }

    /// Variance of the `idx`-th region argument of `name`.
    #[must_use]
    pub fn region_param_variance(&self, name: Symbol, idx: usize) -> Variance {
        self.declared(name, ParamKind::Region, idx)
    }

    /// Variance of the `idx`-th type argument of `name`.
    #[must_use]
    pub fn type_param_variance(&self, name: Symbol, idx: usize) -> Variance {
        self.declared(name, ParamKind::Type, idx)
    }
}

fn pointee_variance(mutability: Mutability) -> Variance {
    match mutability {
        Mutability::Shared => Variance::Covariant,
        Mutability::Mut => Variance::Invariant,
    }
}

fn visit_region(region: RegionRef, variance: Variance, visit: &mut impl FnMut(GenericParam, Variance)) {
    if let RegionRef::Named(name) = region {
        visit(
            GenericParam {
                name,
                kind: ParamKind::Region,
            },
            variance,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_intern::Interner;
    use ks_ir::lower_json;

    fn solve(text: &str) -> (CompilationUnit, VarianceSolution) {
        let unit = lower_json(text, &Interner::new()).unwrap_or_else(|errors| panic!("{errors:?}"));
        let solution = VarianceEngine::new(&unit).solve();
        (unit, solution)
    }

    fn render(unit: &CompilationUnit, table: &VarianceTable, name: &str) -> Vec<String> {
        table
            .variances_of(unit.interner.intern(name))
            .unwrap_or_else(|| panic!("no variances for {name}"))
            .iter()
            .map(|(param, variance)| {
                let quote = if param.kind == ParamKind::Region { "'" } else { "" };
                format!("{quote}{}={variance}", unit.name(param.name))
            })
            .collect()
    }

    #[test]
    fn test_reference_constructors() {
        let (unit, solution) = solve(
            r#"{"types": [
                {"name": "Shared", "regions": ["'a"], "params": ["T"], "fields": [{"name": "r", "ty": "&'a T"}]},
                {"name": "Unique", "regions": ["'a"], "params": ["T"], "fields": [{"name": "r", "ty": "&'a mut T"}]},
                {"name": "Sink", "params": ["T"], "fields": [{"name": "f", "ty": "fn(T)"}]},
                {"name": "Shared2", "params": ["T"], "fields": [{"name": "c", "ty": "RefCell<T>"}]}
            ]}"#,
        );
        assert!(solution.errors.is_empty());
        let table = &solution.table;
        assert_eq!(render(&unit, table, "Shared"), ["'a=covariant", "T=covariant"]);
        assert_eq!(render(&unit, table, "Unique"), ["'a=covariant", "T=invariant"]);
        assert_eq!(render(&unit, table, "Sink"), ["T=contravariant"]);
        assert_eq!(render(&unit, table, "Shared2"), ["T=invariant"]);
    }

    #[test]
    fn test_invariance_wins_over_covariant_uses() {
        let (unit, solution) = solve(
            r#"{"types": [
                {"name": "Mixed", "regions": ["'a"], "params": ["T"], "fields": [
                    {"name": "a", "ty": "T"},
                    {"name": "b", "ty": "Vec<T>"},
                    {"name": "c", "ty": "&'a mut T"},
                    {"name": "d", "ty": "Box<T>"}
                ]}
            ]}"#,
        );
        assert_eq!(
            render(&unit, &solution.table, "Mixed"),
            ["'a=covariant", "T=invariant"]
        );
    }

    #[test]
    fn test_double_negation_and_unused() {
        let (unit, solution) = solve(
            r#"{"types": [
                {"name": "Cb", "params": ["T", "U"], "fields": [{"name": "f", "ty": "fn(fn(T))"}]}
            ]}"#,
        );
        assert_eq!(
            render(&unit, &solution.table, "Cb"),
            ["T=covariant", "U=bivariant"]
        );
    }

    #[test]
    fn test_mutually_recursive_constructors_converge() {
        let (unit, solution) = solve(
            r#"{"types": [
                {"name": "A", "params": ["T"], "fields": [{"name": "b", "ty": "Option<Box<B<T>>>"}]},
                {"name": "B", "params": ["T"], "fields": [{"name": "a", "ty": "Box<A<T>>"}, {"name": "f", "ty": "fn(T)"}]},
                {"name": "List", "params": ["T"], "fields": [{"name": "v", "ty": "T"}, {"name": "next", "ty": "Option<Box<List<T>>>"}]}
            ]}"#,
        );
        assert!(solution.errors.is_empty());
        assert_eq!(render(&unit, &solution.table, "A"), ["T=contravariant"]);
        assert_eq!(render(&unit, &solution.table, "B"), ["T=contravariant"]);
        assert_eq!(render(&unit, &solution.table, "List"), ["T=covariant"]);
    }

    #[test]
    fn test_iteration_cap_reports_unconverged_constructors() {
        let unit = lower_json(
            r#"{"types": [
                {"name": "B", "params": ["T"], "fields": [{"name": "f", "ty": "fn(T)"}]},
                {"name": "A", "params": ["T"], "fields": [{"name": "b", "ty": "B<T>"}]}
            ]}"#,
            &Interner::new(),
        )
        .unwrap_or_else(|errors| panic!("{errors:?}"));
        let a = unit.interner.intern("A");

        let err = compute_variance(&unit, a, 1).err();
        assert!(matches!(err, Some(VarianceError::NoFixedPoint { passes: 1, .. })));
        let variances = compute_variance(&unit, a, DEFAULT_ITERATION_CAP)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(variances.values().copied().collect::<Vec<_>>(), [Variance::Contravariant]);
    }

    #[test]
    fn test_variance_of_region_in() {
        let (unit, solution) = solve(
            r#"{"types": [{"name": "W", "regions": ["'a"], "fields": [{"name": "f", "ty": "fn(&'a u8)"}]}]}"#,
        );
        let interner = &unit.interner;
        let a = RegionRef::Named(interner.intern("a"));
        let ty = ks_ir::syntax::parse_ty("&'a mut W<'a>", interner)
            .unwrap_or_else(|| panic!("parse"));
        let table = &solution.table;
        assert_eq!(render(&unit, table, "W"), ["'a=contravariant"]);
        // `&'a` is covariant in `'a`; `&mut W<'a>` puts W's contravariant use
        // under an invariant pointee.
        assert_eq!(table.variance_of_region_in(&ty, a), Variance::Invariant);
        let shared = ks_ir::syntax::parse_ty("&'a u8", interner).unwrap_or_else(|| panic!("parse"));
        assert_eq!(table.variance_of_region_in(&shared, a), Variance::Covariant);
        assert_eq!(
            table.variance_of_region_in(&shared, RegionRef::Static),
            Variance::Bivariant
        );
    }
}
