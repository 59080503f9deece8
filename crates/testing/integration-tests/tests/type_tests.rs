//! Variance inference, subtyping and drop checking over type definitions

use integration_tests::{Workspace, check, elaborate};
use ks_driver::{ErrorKind, Severity};
use ks_ir::syntax::parse_ty;
use ks_region::RegionScope;
use ks_variance::Subtyping;

#[test]
fn test_inferred_variances_are_annotated() {
    let report = check("variance", include_str!("fixtures/variance.json"));
    assert_eq!(report.error_count(), 0);

    let annotated = report.annotated.expect("clean unit is annotated");
    let variance = |ty: &str, param: &str| {
        let def = annotated.types.iter().find(|def| def.name == ty).unwrap();
        def.variances[param].clone()
    };
    assert_eq!(variance("Mixed", "'a"), "covariant");
    assert_eq!(variance("Mixed", "T"), "invariant");
    assert_eq!(variance("Callback", "T"), "contravariant");
    assert_eq!(variance("Shared", "T"), "invariant");
    assert_eq!(variance("List", "T"), "covariant");
    assert_eq!(variance("Tagged", "T"), "bivariant");
}

#[test]
fn test_unused_parameter_is_a_warning() {
    let report = check("variance", include_str!("fixtures/variance.json"));
    assert_eq!(report.warning_count(), 1);

    let warning = &report.diagnostics[0];
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.kind, ErrorKind::UnusedParameter);
    assert_eq!(warning.location.item, "Tagged");
    assert_eq!(warning.message, "parameter `T` is never used");
    assert!(report.passed());
}

#[test]
fn test_subtyping_follows_variance() {
    let elaborated = elaborate(include_str!("fixtures/variance.json")).unwrap();
    let interner = &elaborated.unit.interner;
    let narrow = interner.intern("narrow");
    let subtyping = Subtyping::new(
        &elaborated.graph,
        &elaborated.variances,
        RegionScope::Function(narrow),
    );
    let ty = |text: &str| parse_ty(text, interner).unwrap();

    // 'l: 's
    assert!(subtyping.is_subtype(&ty("&'l u8"), &ty("&'s u8")));
    assert!(!subtyping.is_subtype(&ty("&'s u8"), &ty("&'l u8")));

    assert!(subtyping.is_subtype(&ty("Mixed<'l, u8>"), &ty("Mixed<'s, u8>")));
    assert!(!subtyping.is_subtype(&ty("Mixed<'s, u8>"), &ty("Mixed<'l, u8>")));

    // Invariant in T
    assert!(!subtyping.is_subtype(&ty("Mixed<'s, &'l u8>"), &ty("Mixed<'s, &'s u8>")));

    // Contravariant in the argument
    assert!(subtyping.is_subtype(&ty("fn(&'s u8) -> bool"), &ty("fn(&'l u8) -> bool")));
    assert!(!subtyping.is_subtype(&ty("fn(&'l u8) -> bool"), &ty("fn(&'s u8) -> bool")));
}

#[test]
fn test_variance_cap_from_config() {
    let workspace = Workspace::new().unwrap();
    workspace
        .write("variance.json", include_str!("fixtures/variance.json"))
        .unwrap();
    workspace
        .write("kestrel.toml", "[analysis]\nvariance-iteration-cap = 1\n")
        .unwrap();

    let report = workspace.check("variance.json").unwrap();
    assert_eq!(report.error_count(), 4);
    assert!(
        report
            .errors()
            .all(|diag| diag.kind == ErrorKind::VarianceCycleError)
    );
    assert_eq!(
        report.diagnostics[0].message,
        "variance of `Mixed` did not stabilize within 1 passes"
    );
    assert_eq!(report.warning_count(), 1);
    assert!(!report.passed());
}

#[test]
fn test_drop_check() {
    let report = check("drop", include_str!("fixtures/drop.json"));

    assert_eq!(
        report.kinds(),
        [ErrorKind::UnsoundDropError, ErrorKind::UnsoundDropError]
    );
    let items: Vec<_> = report
        .diagnostics
        .iter()
        .map(|diag| diag.location.item.as_str())
        .collect();
    assert_eq!(items, ["RawVec", "Borrowing"]);
    assert_eq!(
        report.diagnostics[0].message,
        "destructor of `RawVec` accesses `T`, which `RawVec` does not own"
    );
    assert_eq!(report.warning_count(), 0);
}

#[test]
fn test_cyclic_outlives_bounds() {
    let report = check(
        "cycle",
        r#"{"types": [{"name": "Loop", "regions": ["'a: 'b", "'b: 'a"],
            "fields": [{"name": "x", "ty": "&'a u8"}, {"name": "y", "ty": "&'b u8"}]}]}"#,
    );
    assert_eq!(report.kinds(), [ErrorKind::CycleError]);
    assert_eq!(report.diagnostics[0].location.item, "Loop");
    assert!(report.diagnostics[0].message.starts_with("outlives bounds in `Loop` form a cycle"));
}
