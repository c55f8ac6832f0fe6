mod common;

use std::path::PathBuf;

use apicov::config::{CONFIG_FILE, SURFACES_FILE, ScanOptions};
use apicov::diagnostics::{CoverageError, ScanLog};
use apicov::printer::ReportFormat;
use common::store_project;

#[test]
fn project_file_drives_a_scan() {
    let project = store_project();
    let config = project.write(
        CONFIG_FILE,
        r#"
[scan]
root = "classes"
surfaces = ["com.acme.Store"]
declarations = ["surfaces.toml"]

[report]
format = "json"
title = "Store"
"#,
    );

    let plan = ScanOptions::load(&config).unwrap().resolve().unwrap();
    assert_eq!(plan.root, project.classes());
    assert_eq!(plan.declarations, vec![project.path().join("surfaces.toml")]);
    assert_eq!(plan.format, ReportFormat::Json);
    assert_eq!(plan.print.title, "Store");

    let report = apicov::scan(&plan, &mut ScanLog::new()).unwrap();
    assert_eq!(report.tracked_count(), 4);
}

#[test]
fn command_line_overrides_the_project_file() {
    let project = store_project();
    let config = project.write(
        CONFIG_FILE,
        r#"
[scan]
root = "classes"
surfaces = ["com.acme.Store"]
declarations = ["surfaces.toml"]

[report]
format = "json"
"#,
    );
    let cli = ScanOptions {
        surfaces: vec!["com.acme.Slow".into()],
        format: Some(ReportFormat::Csv),
        output: Some(PathBuf::from("report.csv")),
        ..Default::default()
    };

    let plan = ScanOptions::load(&config).unwrap().merge(cli).resolve().unwrap();
    assert_eq!(plan.surfaces, vec!["com.acme.Store", "com.acme.Slow"]);
    assert_eq!(plan.format, ReportFormat::Csv);
    assert_eq!(plan.output, Some(PathBuf::from("report.csv")));
    // Title falls back to the root directory name
    assert_eq!(plan.print.title, "classes");
}

#[test]
fn surface_list_file_in_the_root() {
    let project = store_project();
    project.write(
        &format!("classes/{SURFACES_FILE}"),
        "# tracked APIs\ncom.acme.Store\ncom.acme.Timeout\ncom.acme.Store\n",
    );
    let plan = ScanOptions {
        root: Some(project.classes()),
        declarations: vec![project.path().join("surfaces.toml")],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    assert_eq!(plan.surfaces, vec!["com.acme.Store", "com.acme.Timeout"]);
}

#[test]
fn malformed_project_file_carries_a_span() {
    let project = store_project();
    let config = project.write(CONFIG_FILE, "[scan]\nroot = \n");
    let err = ScanOptions::load(&config).unwrap_err();
    match err {
        CoverageError::Manifest { path, span, .. } => {
            assert_eq!(path, config);
            assert!(span.is_some());
        }
        other => panic!("expected a manifest error, got {other:?}"),
    }
}

#[test]
fn missing_project_file_is_a_manifest_error() {
    let project = store_project();
    let err = ScanOptions::load(&project.path().join(CONFIG_FILE)).unwrap_err();
    assert!(matches!(err, CoverageError::Manifest { .. }), "{err:?}");
}

#[test]
fn declaration_errors_are_reported_with_the_file() {
    let project = store_project();
    let bad = project.write(
        "bad.toml",
        "[[surface]]\nname = \"com.acme.Bad\"\n\n[[surface.method]]\nname = \"m\"\nparams = [\"not a type\"]\n",
    );
    let plan = ScanOptions {
        root: Some(project.classes()),
        surfaces: vec!["com.acme.Bad".into()],
        declarations: vec![bad],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let err = apicov::scan(&plan, &mut ScanLog::new()).unwrap_err();
    assert!(matches!(err, CoverageError::Descriptor { .. }), "{err:?}");
}

#[test]
fn classpath_entry_must_be_a_directory() {
    let project = store_project();
    let plan = ScanOptions {
        root: Some(project.classes()),
        classpath: vec![project.path().join("surfaces.toml")],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let err = apicov::scan(&plan, &mut ScanLog::new()).unwrap_err();
    assert!(matches!(err, CoverageError::Configuration { .. }), "{err:?}");
}
