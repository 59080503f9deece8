//! Signature elision and output validation

use integration_tests::{check, elaborate};
use ks_driver::ErrorKind;
use ks_intern::Interner;
use ks_ir::{lower_json, to_wire};

#[test]
fn test_signature_fixture() {
    let report = check("signatures", include_str!("fixtures/signatures.json"));

    assert_eq!(
        report.kinds(),
        [ErrorKind::AmbiguousElisionError, ErrorKind::UnboundedOutputError]
    );
    let items: Vec<_> = report
        .diagnostics
        .iter()
        .map(|diag| diag.location.item.as_str())
        .collect();
    assert_eq!(items, ["pair", "detached"]);
    assert_eq!(
        report.diagnostics[1].message,
        "output region `'b` of `detached` does not come from any input"
    );
    assert!(report.diagnostics[1].help.is_some());
}

const ELIDABLE: &str = r#"{
    "types": [{"name": "Counter", "fields": [{"name": "count", "ty": "u32"}]}],
    "functions": [
        {"name": "substr", "params": [{"name": "s", "ty": "&str"}, {"name": "until", "ty": "u32"}], "ret": "&str"},
        {"name": "get", "params": [{"name": "self", "ty": "&Counter"}, {"name": "key", "ty": "&str"}], "ret": "&u32"}
    ]
}"#;

#[test]
fn test_elided_regions_are_spelled_out() {
    let elaborated = elaborate(ELIDABLE).unwrap();
    let wire = to_wire(&elaborated.unit);

    let substr = &wire.functions[0];
    assert_eq!(substr.params[0].ty, "&'a str");
    assert_eq!(substr.params[1].ty, "u32");
    assert_eq!(substr.ret.as_deref(), Some("&'a str"));

    let get = &wire.functions[1];
    assert_eq!(get.params[0].ty, "&'a Counter");
    assert_eq!(get.params[1].ty, "&'b str");
    assert_eq!(get.ret.as_deref(), Some("&'a u32"));
}

#[test]
fn test_elision_is_idempotent() {
    let mut unit = lower_json(ELIDABLE, &Interner::new()).unwrap();
    let interner = unit.interner.clone();
    for def in unit.functions.values_mut() {
        ks_lifetime::elide_fn(def, &interner).unwrap();
    }
    let once = to_wire(&unit);

    for def in unit.functions.values_mut() {
        let fresh = ks_lifetime::elide_fn(def, &interner).unwrap();
        assert!(fresh.is_empty());
    }
    assert_eq!(to_wire(&unit), once);
}

#[test]
fn test_explicit_regions_survive_elision() {
    let report = check(
        "explicit",
        r#"{"functions": [{"name": "longest", "regions": ["'a"],
            "params": [{"name": "x", "ty": "&'a str"}, {"name": "y", "ty": "&'a str"}],
            "ret": "&'a str"}]}"#,
    );
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    let annotated = report.annotated.unwrap();
    assert_eq!(annotated.functions[0].regions, ["'a"]);
    assert_eq!(annotated.functions[0].ret.as_deref(), Some("&'a str"));
}

#[test]
fn test_outlives_bound_makes_output_traceable() {
    let report = check(
        "bounded",
        r#"{"functions": [{"name": "shorten", "regions": ["'s", "'l: 's"],
            "params": [{"name": "x", "ty": "&'l u8"}],
            "ret": "&'s u8"}]}"#,
    );
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let report = check(
        "unbounded",
        r#"{"functions": [{"name": "lengthen", "regions": ["'s", "'l: 's"],
            "params": [{"name": "x", "ty": "&'s u8"}],
            "ret": "&'l u8"}]}"#,
    );
    assert_eq!(report.kinds(), [ErrorKind::UnboundedOutputError]);
    assert_eq!(
        report.diagnostics[0].message,
        "output region `'l` of `lengthen` does not come from any input"
    );
}

#[test]
fn test_zero_input_output_is_ambiguous() {
    let report = check(
        "nothing",
        r#"{"functions": [{"name": "conjure", "ret": "&u8"}]}"#,
    );
    assert_eq!(report.kinds(), [ErrorKind::AmbiguousElisionError]);
    assert_eq!(
        report.diagnostics[0].message,
        "missing region specifier in `conjure`: 0 input regions and no receiver"
    );
}
