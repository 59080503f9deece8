//! End-to-end borrow checking scenarios

use integration_tests::{check, elaborate};
use ks_borrow_check::{BorrowChecker, DisjointnessProof, DisjointnessProver, ProverRegistry};
use ks_driver::{Analyzer, ErrorKind};
use ks_ir::Place;

#[test]
fn test_shared_view_of_mutable_loan_stays_exclusive() {
    let report = check("weird", include_str!("fixtures/weird_lifetimes.json"));

    assert_eq!(report.kinds(), [ErrorKind::BorrowConflictError]);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.location.to_string(), "main#5");
    assert_eq!(diagnostic.message, "cannot borrow `foo` because it is borrowed as mutable");
    assert!(report.annotated.is_none());
}

#[test]
fn test_releasing_the_derived_loan_ends_exclusivity() {
    let fixed = include_str!("fixtures/weird_lifetimes.json").replace(
        r#"{"op": "borrow", "handle": "s", "place": "foo"}"#,
        r#"{"op": "release", "handle": "loan"}, {"op": "borrow", "handle": "s", "place": "foo"}"#,
    );
    let report = check("weird", &fixed);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert!(report.passed());
}

#[test]
fn test_split_halves_coexist() {
    let report = check("split", include_str!("fixtures/split.json"));
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let reading = include_str!("fixtures/split.json").replace(
        r#"{"op": "release", "handle": "left"},"#,
        r#"{"op": "read", "place": "buf[1]"}, {"op": "release", "handle": "left"},"#,
    );
    let report = check("split", &reading);
    assert_eq!(report.kinds(), [ErrorKind::BorrowConflictError]);
    assert_eq!(report.diagnostics[0].location.to_string(), "fill_halves#5");
    assert_eq!(
        report.diagnostics[0].message,
        "cannot read `buf[1]` because it is borrowed as mutable"
    );
}

#[test]
fn test_iterator_yields() {
    let report = check("iterators", include_str!("fixtures/iterators.json"));

    let found: Vec<_> = report
        .diagnostics
        .iter()
        .map(|diag| (diag.location.to_string(), diag.message.as_str()))
        .collect();
    assert_eq!(
        found,
        [
            (
                "hold_two_then_expose#5".to_string(),
                "cannot access the backing store of `it` while a yielded element is live"
            ),
            (
                "lend_two#4".to_string(),
                "cannot advance `it` while a previously yielded element is live"
            ),
        ]
    );
}

#[test]
fn test_one_shot_type_with_public_mutable_field() {
    let report = check(
        "iter_mut",
        r#"{"types": [
            {"name": "IterMut", "regions": ["'a"], "params": ["T"], "one-shot": true,
             "fields": [{"name": "rest", "ty": "&'a mut [T]", "pub": true}]}
        ]}"#,
    );
    assert_eq!(report.kinds(), [ErrorKind::BorrowConflictError]);
    assert_eq!(report.diagnostics[0].location.to_string(), "IterMut");
}

#[test]
fn test_discriminant_change_under_payload_loan() {
    let report = check(
        "tagged",
        r#"{"types": [{"name": "Slot", "kind": "enum", "variants": [
                {"name": "Empty"},
                {"name": "Full", "fields": [{"name": "0", "ty": "String"}]}]}],
            "functions": [{"name": "main", "locals": [{"name": "slot", "ty": "Slot", "mut": true}], "body": [
                {"op": "bind", "local": "slot"},
                {"op": "borrow", "handle": "inner", "place": "slot@Full.0"},
                {"op": "write", "place": "slot@Empty", "discriminant": true}
            ]}]}"#,
    );
    assert_eq!(report.kinds(), [ErrorKind::BorrowConflictError]);
    assert_eq!(
        report.diagnostics[0].message,
        "cannot change the discriminant of `slot` because it is borrowed as shared"
    );
}

#[test]
fn test_returning_reference_to_local() {
    let report = check(
        "escape",
        r#"{"functions": [{"name": "dangle", "params": [{"name": "x", "ty": "&u32"}], "ret": "&u32",
            "locals": [{"name": "local", "ty": "u32"}], "body": [
                {"op": "bind", "local": "local"},
                {"op": "borrow", "handle": "r", "place": "local"},
                {"op": "return", "value": "r"}
            ]}]}"#,
    );
    assert_eq!(report.kinds(), [ErrorKind::EscapingBorrowError]);
    assert_eq!(report.diagnostics[0].location.to_string(), "dangle#2");
    assert_eq!(
        report.diagnostics[0].message,
        "cannot return reference to local variable `local`"
    );
}

/// Proves any two distinct keys of a map-like container disjoint.
struct KeyProver;

impl DisjointnessProver for KeyProver {
    fn name(&self) -> &str {
        "keys"
    }

    fn prove_disjoint(&self, left: &Place, right: &Place) -> Option<DisjointnessProof> {
        (left.base == right.base && left != right).then(|| self.proof(left, right))
    }
}

const PROOF_UNIT: &str = r#"{
    "functions": [{"name": "swap", "locals": [{"name": "m", "ty": "Vec<u32>", "mut": true}], "body": [
        {"op": "bind", "local": "m"},
        {"op": "borrow", "handle": "a", "place": "m[0]", "kind": "mut"},
        {"op": "borrow", "handle": "b", "place": "m[1]", "kind": "mut"}
    ]}],
    "proofs": [{"function": "swap", "left": "m[0]", "right": "m[1]"}]
}"#;

#[test]
fn test_proof_requests_use_registered_provers() {
    let report = check("proofs", PROOF_UNIT);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let bogus = PROOF_UNIT.replace(r#""right": "m[1]""#, r#""right": "m[0]""#);
    let report = check("proofs", &bogus);
    assert_eq!(report.kinds(), [ErrorKind::BorrowConflictError]);
    assert_eq!(report.diagnostics[0].message, "cannot prove `m[0]` and `m[0]` disjoint");
    assert_eq!(report.diagnostics[0].location.op, None);

    let nested = PROOF_UNIT.replace(r#""right": "m[1]""#, r#""right": "m[0].key""#);
    let report = check("proofs", &nested);
    assert_eq!(
        report.diagnostics[0].message,
        "cannot prove `m[0]` and `m[0].key` disjoint"
    );

    let report = Analyzer::default()
        .with_prover(Box::new(KeyProver))
        .check_source("proofs", &nested);
    assert_eq!(report.kinds(), [ErrorKind::BorrowConflictError]);
    assert_eq!(report.diagnostics[0].location.to_string(), "swap#2");
    assert_eq!(
        report.diagnostics[0].message,
        "cannot mutably borrow `m[1]` because it is borrowed as mutable"
    );
}

#[test]
fn test_checker_over_elaborated_unit() {
    let elaborated = elaborate(include_str!("fixtures/iterators.json")).unwrap();
    let provers = ProverRegistry::new();
    let checker = BorrowChecker::new(
        &elaborated.unit,
        &elaborated.graph,
        &elaborated.variances,
        &provers,
    );

    let ok = elaborated.unit.interner.intern("one_at_a_time");
    let def = elaborated.unit.function(ok).unwrap();
    assert!(checker.check_function(def).is_ok());

    let errors = checker.check(&|name| name == ok).unwrap_err();
    let items: Vec<_> = errors.iter().map(|err| err.item()).collect();
    assert_eq!(items, ["hold_two_then_expose", "lend_two"]);
}
