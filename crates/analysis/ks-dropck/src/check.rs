//! Destructor soundness check.

use ks_intern::Symbol;
use ks_ir::CompilationUnit;
use tracing::{debug, instrument};

use crate::error::DropError;
use crate::ownership::OwnershipTable;

/// Checks that every destructor only touches type parameters its type owns.
pub struct DropChecker<'u> {
    unit: &'u CompilationUnit,
    ownership: OwnershipTable,
}

impl<'u> DropChecker<'u> {
    /// Computes ownership for `unit`.
    #[must_use]
    pub fn new(unit: &'u CompilationUnit) -> Self {
        Self {
            unit,
            ownership: OwnershipTable::compute(unit),
        }
    }

    /// The ownership facts the check is based on.
    #[must_use]
    pub fn ownership(&self) -> &OwnershipTable {
        &self.ownership
    }

    /// Checks every type with a destructor not excluded by `skip`.
    ///
    /// # Errors
    ///
    /// Returns one [`DropError::Unsound`] per offending type.
    #[instrument(skip_all, fields(unit = %self.unit.name))]
    pub fn check(&self, skip: &dyn Fn(Symbol) -> bool) -> Result<(), Vec<DropError>> {
        let mut errors = Vec::new();
        for def in self.unit.type_defs.values() {
            let Some(drop) = &def.drop else { continue };
            if skip(def.name) {
                continue;
            }
            let missing: Vec<String> = drop
                .accesses
                .iter()
                .filter(|param| !self.ownership.owns(def.name, **param))
                .map(|param| self.unit.name(*param).to_string())
                .collect();
            if missing.is_empty() {
                debug!(ty = %self.unit.name(def.name), "destructor is sound");
                continue;
            }
            errors.push(DropError::Unsound {
                item: self.unit.name(def.name).to_string(),
                missing,
                span: drop.span,
            });
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_intern::Interner;
    use ks_ir::lower_json;

    fn check(types: &str) -> Vec<String> {
        let interner = Interner::new();
        let unit = lower_json(&format!(r#"{{"types": [{types}]}}"#), &interner).unwrap();
        match DropChecker::new(&unit).check(&|_| false) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_pointer_only_type_must_mark_ownership() {
        let errors = check(
            r#"{"name": "RawVec", "params": ["T"],
                "fields": [{"name": "ptr", "ty": "*mut T"}, {"name": "cap", "ty": "usize"}],
                "drop": {"accesses": ["T"]}}"#,
        );
        assert_eq!(
            errors,
            ["destructor of `RawVec` accesses `T`, which `RawVec` does not own"]
        );
    }

    #[test]
    fn test_phantom_and_explicit_ownership() {
        let errors = check(
            r#"{"name": "Phantom", "params": ["T"],
                "fields": [{"name": "ptr", "ty": "*mut T"}, {"name": "marker", "ty": "PhantomData<T>"}],
                "drop": {"accesses": ["T"]}},
               {"name": "Marked", "params": ["T"], "owns": ["T"],
                "fields": [{"name": "ptr", "ty": "*const T"}],
                "drop": {"accesses": ["T"]}}"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_ownership_flows_through_user_types() {
        let errors = check(
            r#"{"name": "Node", "params": ["T"],
                "fields": [{"name": "value", "ty": "Box<T>"}]},
               {"name": "List", "params": ["T", "U"],
                "fields": [{"name": "head", "ty": "Option<Node<T>>"}, {"name": "peek", "ty": "&'static U"}],
                "drop": {"accesses": ["T", "U"]}}"#,
        );
        assert_eq!(
            errors,
            ["destructor of `List` accesses `U`, which `List` does not own"]
        );
    }

    #[test]
    fn test_recursive_types_reach_fixed_point() {
        let interner = Interner::new();
        let unit = lower_json(
            r#"{"types": [
                {"name": "A", "params": ["T"], "fields": [{"name": "b", "ty": "Option<Box<B<T>>>"}]},
                {"name": "B", "params": ["T"], "fields": [{"name": "a", "ty": "Option<Box<A<T>>>"},
                                                          {"name": "v", "ty": "Vec<T>"}]}
            ]}"#,
            &interner,
        )
        .unwrap();
        let table = OwnershipTable::compute(&unit);
        let t = interner.intern("T");
        assert!(table.owns(interner.intern("A"), t));
        assert!(table.owns(interner.intern("B"), t));
        assert_eq!(table.owned_params(interner.intern("A")).count(), 1);
    }
}
