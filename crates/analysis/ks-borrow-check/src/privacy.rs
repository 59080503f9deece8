//! Definition-time encapsulation check for one-shot types.
//!
//! Elements yielded by a one-shot iterator are only disjoint if nothing
//! else can reach the loan they are carved from. A public field holding a
//! mutable reference or a `*mut` pointer would hand that loan out, so such
//! types are rejected when they are defined rather than when they are
//! misused.
//!
//! The `one-shot` flag on an `iter` body op is asserted by the front end.
//! Only the type definitions carrying the flag are checked here.

use ks_intern::Symbol;
use ks_ir::{CompilationUnit, Mutability, Ty, Visibility};
use rustc_hash::FxHashSet;

use crate::error::BorrowError;

/// Checks every type marked one-shot.
#[must_use]
pub fn check_one_shot_privacy(unit: &CompilationUnit) -> Vec<BorrowError> {
    let mut errors = Vec::new();
    for def in unit.type_defs.values().filter(|def| def.one_shot) {
        for field in def.fields() {
            if field.visibility != Visibility::Public {
                continue;
            }
            let mut seen = FxHashSet::default();
            if reaches_mut_ref(unit, &field.ty, &mut seen) {
                errors.push(BorrowError::ExposedOneShot {
                    item: unit.name(def.name).to_string(),
                    field: unit.name(field.name).to_string(),
                    span: def.span,
                });
            }
        }
    }
    errors
}

/// Whether a value of `ty` can hold a mutable reference or a mutable raw
/// pointer, looking through the fields of user-defined types.
fn reaches_mut_ref(unit: &CompilationUnit, ty: &Ty, seen: &mut FxHashSet<Symbol>) -> bool {
    match ty {
        Ty::Ref {
            mutability: Mutability::Mut,
            ..
        }
        | Ty::RawPtr {
            mutability: Mutability::Mut,
            ..
        } => true,
        Ty::Prim(_) | Ty::Param(_) | Ty::FnPtr { .. } => false,
        Ty::Ref { target, .. } | Ty::RawPtr { target, .. } => reaches_mut_ref(unit, target, seen),
        Ty::Slice(elem) | Ty::Array(elem, _) => reaches_mut_ref(unit, elem, seen),
        Ty::Tuple(elems) => elems.iter().any(|elem| reaches_mut_ref(unit, elem, seen)),
        Ty::Adt { name, args, .. } => {
            if args.iter().any(|arg| reaches_mut_ref(unit, arg, seen)) {
                return true;
            }
            if !seen.insert(*name) {
                return false;
            }
            unit.type_def(*name).is_some_and(|def| {
                def.fields()
                    .any(|field| reaches_mut_ref(unit, &field.ty, seen))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_intern::Interner;
    use ks_ir::lower_json;

    fn errors(json: &str) -> Vec<BorrowError> {
        let interner = Interner::new();
        let unit = lower_json(json, &interner).unwrap();
        check_one_shot_privacy(&unit)
    }

    #[test]
    fn test_public_mut_field_rejected() {
        let errors = errors(
            r#"{"types": [
                {"name": "IterMut", "regions": ["'a"], "params": ["T"], "one-shot": true,
                 "fields": [{"name": "slice", "ty": "&'a mut [T]", "pub": true}]}
            ]}"#,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "one-shot type `IterMut` exposes a mutable reference through public field `slice`"
        );
    }

    #[test]
    fn test_private_and_nested_fields() {
        let errors = errors(
            r#"{"types": [
                {"name": "Cursor", "regions": ["'a"],
                 "fields": [{"name": "buf", "ty": "&'a mut [u8]"}]},
                {"name": "Private", "regions": ["'a"], "one-shot": true,
                 "fields": [{"name": "buf", "ty": "&'a mut [u8]"}]},
                {"name": "Nested", "regions": ["'a"], "one-shot": true,
                 "fields": [{"name": "cursor", "ty": "Cursor<'a>", "pub": true},
                            {"name": "len", "ty": "usize", "pub": true}]},
                {"name": "Shared", "regions": ["'a"], "one-shot": true,
                 "fields": [{"name": "buf", "ty": "&'a [u8]", "pub": true}]}
            ]}"#,
        );
        let items: Vec<_> = errors.iter().map(BorrowError::item).collect();
        assert_eq!(items, ["Nested"]);
    }

    #[test]
    fn test_public_mut_pointer_rejected() {
        let errors = errors(
            r#"{"types": [
                {"name": "RawIter", "params": ["T"], "one-shot": true,
                 "fields": [{"name": "ptr", "ty": "*mut T", "pub": true},
                            {"name": "end", "ty": "*const T", "pub": true}]},
                {"name": "ConstIter", "params": ["T"], "one-shot": true,
                 "fields": [{"name": "ptr", "ty": "*const T", "pub": true}]}
            ]}"#,
        );
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            ["one-shot type `RawIter` exposes a mutable reference through public field `ptr`"]
        );
    }
}
