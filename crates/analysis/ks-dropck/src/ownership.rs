//! Which type parameters each type constructor owns.
//!
//! A constructor owns `T` when dropping it may drop a `T`: `T` is stored by
//! value (possibly through owning constructors or user types that own the
//! matching parameter), appears in a `PhantomData`, or is listed in `owns`.
//! References, raw pointers and function pointers never own.

use indexmap::{IndexMap, IndexSet};
use ks_intern::Symbol;
use ks_ir::{BUILTIN_CONSTRUCTORS, CompilationUnit, Ty, TypeDef};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

/// Owned type parameters of every constructor in a unit.
#[derive(Debug, Clone, Default)]
pub struct OwnershipTable {
    owned: IndexMap<Symbol, IndexSet<Symbol>>,
    params: FxHashMap<Symbol, Vec<Symbol>>,
    builtins: FxHashSet<Symbol>,
}

impl OwnershipTable {
    /// Computes ownership for every type of `unit`.
    ///
    /// Sets only grow, and are bounded by each type's parameter list, so
    /// the iteration terminates.
    #[must_use]
    pub fn compute(unit: &CompilationUnit) -> Self {
        let mut table = Self {
            owned: unit
                .type_defs
                .values()
                .map(|def| (def.name, def.owns.iter().copied().collect()))
                .collect(),
            params: unit
                .type_defs
                .values()
                .map(|def| (def.name, def.type_params.clone()))
                .collect(),
            builtins: BUILTIN_CONSTRUCTORS
                .iter()
                .map(|name| unit.interner.intern(name))
                .collect(),
        };

        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for def in unit.type_defs.values() {
                changed |= table.refine(def);
            }
            trace!(passes, changed, "ownership pass");
            if !changed {
                break;
            }
        }
        debug!(passes, "ownership fixed point reached");
        table
    }

    fn refine(&mut self, def: &TypeDef) -> bool {
        let mut found = IndexSet::new();
        for field in def.fields() {
            self.collect_owned(&field.ty, &mut found);
        }
        let Some(owned) = self.owned.get_mut(&def.name) else {
            return false;
        };
        let before = owned.len();
        owned.extend(found.into_iter().filter(|param| def.type_params.contains(param)));
        owned.len() != before
    }

    /// Adds the type parameters a value of `ty` owns to `found`.
    fn collect_owned(&self, ty: &Ty, found: &mut IndexSet<Symbol>) {
        match ty {
            Ty::Param(name) => {
                found.insert(*name);
            }
            Ty::Prim(_) | Ty::Ref { .. } | Ty::RawPtr { .. } | Ty::FnPtr { .. } => {}
            Ty::Slice(elem) | Ty::Array(elem, _) => self.collect_owned(elem, found),
            Ty::Tuple(elems) => {
                for elem in elems {
                    self.collect_owned(elem, found);
                }
            }
            Ty::Adt { name, args, .. } => {
                if self.builtins.contains(name) {
                    for arg in args {
                        self.collect_owned(arg, found);
                    }
                } else if let Some(owned) = self.owned.get(name) {
                    self.collect_user_args(*name, owned, args, found);
                }
            }
        }
    }

    fn collect_user_args(
        &self,
        name: Symbol,
        owned: &IndexSet<Symbol>,
        args: &[Ty],
        found: &mut IndexSet<Symbol>,
    ) {
        let Some(params) = self.params.get(&name) else {
            return;
        };
        for (param, arg) in params.iter().zip(args) {
            if owned.contains(param) {
                self.collect_owned(arg, found);
            }
        }
    }

    /// Whether `ty_name` owns its type parameter `param`.
    #[must_use]
    pub fn owns(&self, ty_name: Symbol, param: Symbol) -> bool {
        self.owned
            .get(&ty_name)
            .is_some_and(|owned| owned.contains(&param))
    }

    /// Owned parameters of `ty_name`.
    pub fn owned_params(&self, ty_name: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.owned.get(&ty_name).into_iter().flatten().copied()
    }
}
