//! Report ordering, locations and configuration

use expect_test::expect;
use integration_tests::{Workspace, check, summary};
use ks_driver::{Config, ErrorKind, FileSpan, OutputFormat};
use ks_span::{FileId, Span};

const MIXED: &str = include_str!("fixtures/mixed.json");

#[test]
fn test_mixed_unit_summary() {
    let report = check("mixed", MIXED);
    expect![[r#"
        warning[UnusedParameter] Tagged: parameter `T` is never used
        error[AmbiguousElisionError] pair: missing region specifier in `pair`: 2 input regions and no receiver
        error[BorrowConflictError] conflict#2: cannot assign to `x` because it is borrowed as shared
        error[UnsoundDropError] Leaky: destructor of `Leaky` accesses `T`, which `Leaky` does not own
        3 error(s), 1 warning(s), annotated: false"#]]
    .assert_eq(&summary(&report));
}

#[test]
fn test_locations_carry_spans() {
    let report = check("mixed", MIXED);
    assert_eq!(report.unit, "mixed");

    let conflict = &report.diagnostics[2];
    assert_eq!(conflict.location.op, Some(2));
    assert_eq!(
        conflict.location.span,
        FileSpan::new(FileId::new(7), Span::new(130, 135))
    );
    assert!(conflict.help.is_some());
}

#[test]
fn test_json_report() {
    let report = check("mixed", MIXED);
    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["unit"], "mixed");
    assert_eq!(value["diagnostics"].as_array().map(Vec::len), Some(4));
    assert_eq!(value["diagnostics"][0]["severity"], "warning");
    assert_eq!(value["diagnostics"][2]["kind"], "BorrowConflictError");
    assert_eq!(value["diagnostics"][2]["location"]["item"], "conflict");
    assert_eq!(value["diagnostics"][2]["location"]["op"], 2);
    assert!(value.get("annotated").is_none());
}

#[test]
fn test_workspace_config_limits_report() {
    let workspace = Workspace::new().unwrap();
    workspace.write("mixed.json", MIXED).unwrap();
    workspace
        .write(
            "kestrel.toml",
            "[analysis]\nwarn-unused-params = false\nmax-diagnostics = 2\n",
        )
        .unwrap();

    let report = workspace.check("mixed.json").unwrap();
    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(report.diagnostics[0].location.item, "pair");
    assert_eq!(report.warning_count(), 0);
    assert!(!report.passed());
}

#[test]
fn test_workspace_without_config_uses_defaults() {
    let workspace = Workspace::new().unwrap();
    workspace.write("mixed.json", MIXED).unwrap();

    let report = workspace.check("mixed.json").unwrap();
    assert_eq!(report.diagnostics.len(), 4);
    assert_eq!(report.error_count(), 3);
}

#[test]
fn test_invalid_config_is_an_error() {
    let workspace = Workspace::new().unwrap();
    workspace.write("mixed.json", MIXED).unwrap();
    workspace
        .write("kestrel.toml", "[analysis]\nvariance-cap = 3\n")
        .unwrap();

    assert!(workspace.check("mixed.json").is_err());
}

#[test]
fn test_output_config_does_not_change_findings() {
    let config = Config::parse("[output]\nformat = \"json\"\nemit-annotated = true\n").unwrap();
    assert_eq!(config.output.format, OutputFormat::Json);

    let report = ks_driver::check_source("mixed", MIXED, &config);
    assert_eq!(report, check("mixed", MIXED));
}

#[test]
fn test_malformed_document() {
    let report = check("broken", r#"{"types": [{"name": "A", "fields": [{"name": "x", "ty": "Nope"}]}]}"#);
    assert_eq!(report.kinds(), [ErrorKind::MalformedIrError]);
    assert_eq!(report.diagnostics[0].location.item, "A");
    assert_eq!(report.diagnostics[0].message, "unknown type `Nope` in `A`");
    assert!(!report.passed());
}
