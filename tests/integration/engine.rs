mod common;

use std::path::Path;

use apicov::classfile::{ClassWriter, CodeWriter, MethodWriter};
use apicov::config::ScanOptions;
use apicov::diagnostics::{CoverageError, ScanEvent, ScanLog};
use apicov::exclusion::ExclusionReason;
use apicov::report::{CoverageReport, MethodTuple};
use common::{GET, PUT_INT, PUT_LONG, Project, store_project};

const ALL_SURFACES: [&str; 4] = [
    "com.acme.Store",
    "com.acme.CachingStore",
    "com.acme.Slow",
    "com.acme.Timeout",
];

fn scan_with(project: &Project, surfaces: &[&str], exclusions: Option<&Path>) -> (CoverageReport, ScanLog) {
    let plan = ScanOptions {
        root: Some(project.classes()),
        surfaces: surfaces.iter().map(|s| s.to_string()).collect(),
        declarations: vec![project.path().join("surfaces.toml")],
        exclusions: exclusions.map(Path::to_path_buf),
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let mut log = ScanLog::new();
    let report = apicov::scan(&plan, &mut log).unwrap();
    (report, log)
}

fn sites(report: &CoverageReport, surface: &str, name: &str, descriptor: &str) -> Vec<String> {
    report
        .calls(surface, &MethodTuple::new(name, descriptor))
        .unwrap_or_else(|| panic!("{surface}.{name}{descriptor} is not tracked"))
        .iter()
        .map(ToString::to_string)
        .collect()
}

// ── End to end ──────────────────────────────────────────────────────────────

#[test]
fn report_keys_are_exactly_the_seeded_methods() {
    let project = store_project();
    let (report, _) = scan_with(&project, &ALL_SURFACES, None);

    let keys: Vec<String> = report
        .keys()
        .map(|(surface, tuple)| format!("{surface} {tuple}"))
        .collect();
    assert_eq!(
        keys,
        vec![
            "com.acme.CachingStore flush@()V",
            "com.acme.Slow <usage>@()V",
            "com.acme.Store clear@()V",
            "com.acme.Store get@(Ljava/lang/String;)I",
            "com.acme.Store put@(Ljava/lang/String;I)V",
            "com.acme.Store put@(Ljava/lang/String;J)V",
            "com.acme.Timeout value@()J",
        ]
    );
    assert_eq!(report.tracked_count(), 7);
    assert_eq!(report.covered_count(), 6);
}

#[test]
fn overloads_are_told_apart_by_descriptor() {
    let project = store_project();
    let (report, _) = scan_with(&project, &["com.acme.Store"], None);

    assert_eq!(
        sites(&report, "com.acme.Store", "put", PUT_INT),
        vec!["com.acme.StoreTest @ testPut() # 12", "com.acme.StoreTest @ testPut() # 13"]
    );
    assert!(sites(&report, "com.acme.Store", "put", PUT_LONG).is_empty());
}

#[test]
fn calls_on_the_same_line_are_recorded_once() {
    let project = store_project();
    let (report, _) = scan_with(&project, &["com.acme.Store"], None);
    let puts = sites(&report, "com.acme.Store", "put", PUT_INT);
    assert_eq!(puts.iter().filter(|site| site.ends_with("# 13")).count(), 1);
}

#[test]
fn calls_through_a_tracked_subtype_count_for_the_declaring_surface() {
    let project = store_project();
    let (report, _) = scan_with(&project, &ALL_SURFACES, None);

    assert_eq!(
        sites(&report, "com.acme.Store", "get", GET),
        vec!["com.acme.StoreTest @ testCaching(java.lang.String) # 20"]
    );
    assert_eq!(
        sites(&report, "com.acme.CachingStore", "flush", "()V"),
        vec!["com.acme.StoreTest @ testCaching(java.lang.String) # 21"]
    );
}

#[test]
fn untracked_subtype_is_not_followed() {
    let project = store_project();
    let (report, _) = scan_with(&project, &["com.acme.Store"], None);
    // CachingStore is not tracked, so its calls are not attributed to Store
    assert!(sites(&report, "com.acme.Store", "get", GET).is_empty());
}

#[test]
fn annotation_usages() {
    let project = store_project();
    let (report, _) = scan_with(&project, &ALL_SURFACES, None);

    assert_eq!(
        sites(&report, "com.acme.Slow", "<usage>", "()V"),
        vec!["com.acme.StoreTest @ <class> # ?"]
    );
    assert_eq!(
        sites(&report, "com.acme.Timeout", "value", "()J"),
        vec!["com.acme.StoreTest @ testPut() # 10"]
    );
}

#[test]
fn missing_line_table_gives_unknown_line() {
    let project = store_project();
    let (report, _) = scan_with(&project, &["com.acme.Store"], None);
    assert_eq!(
        sites(&report, "com.acme.Store", "clear", "()V"),
        vec!["com.acme.other.NoLines @ run() # ?"]
    );
}

// ── Exclusions ──────────────────────────────────────────────────────────────

#[test]
fn base_policy_drops_deprecated_and_object_methods() {
    let project = store_project();
    let (report, log) = scan_with(&project, &["com.acme.Store"], None);

    assert!(report.calls("com.acme.Store", &MethodTuple::new("legacy", "()V")).is_none());
    assert_eq!(
        log.exclusions().collect::<Vec<_>>(),
        vec![
            ("com.acme.Store", "legacy@()V", ExclusionReason::Deprecated),
            (
                "com.acme.Store",
                "equals@(Ljava/lang/Object;)Z",
                ExclusionReason::ObjectMethod
            ),
        ]
    );
}

#[test]
fn listed_triples_vanish_from_the_report() {
    let project = store_project();
    let exclusions = project.write(
        "exclusions.txt",
        "# flaky\ncom.acme.Store@clear@()V\ncom.acme.Store@put@(Ljava/lang/String;J)V\n",
    );
    let (report, log) = scan_with(&project, &["com.acme.Store"], Some(&exclusions));

    let keys: Vec<String> = report.keys().map(|(_, tuple)| tuple.to_string()).collect();
    assert_eq!(
        keys,
        vec!["get@(Ljava/lang/String;)I", "put@(Ljava/lang/String;I)V"]
    );
    assert_eq!(
        log.exclusions()
            .filter(|(_, _, reason)| *reason == ExclusionReason::Listed)
            .count(),
        2
    );
}

#[test]
fn exclusions_file_in_the_root_is_picked_up() {
    let project = store_project();
    project.write("classes/exclusions.txt", "com.acme.Store@clear@()V\n");
    let (report, _) = scan_with(&project, &["com.acme.Store"], None);
    assert!(report.calls("com.acme.Store", &MethodTuple::new("clear", "()V")).is_none());
}

// ── Recoverable failures ────────────────────────────────────────────────────

#[test]
fn corrupt_and_foreign_files_are_skipped() {
    let project = store_project();
    let (report, log) = scan_with(&project, &["com.acme.Store"], None);

    assert_eq!(log.units_scanned(), 2);
    let skipped: Vec<&Path> = log.skipped_units().collect();
    assert_eq!(skipped, vec![project.classes().join("com/acme/Broken.class")]);
    assert!(!report.is_empty());
}

#[test]
fn files_without_the_class_magic_are_skipped_with_a_reason() {
    let project = store_project();
    let (_, log) = scan_with(&project, &["com.acme.Store"], None);
    let reasons: Vec<&str> = log
        .events()
        .iter()
        .filter_map(|event| match event {
            ScanEvent::UnitSkipped { reason, .. } => Some(reason.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(reasons, vec!["not a class file"]);
}

#[cfg(unix)]
#[test]
fn symlinked_units_are_logged_not_followed() {
    let project = store_project();
    let target = project.classes().join("com/acme/StoreTest.class");
    let link = project.classes().join("com/acme/Linked.class");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let (_, log) = scan_with(&project, &["com.acme.Store"], None);
    assert_eq!(log.units_scanned(), 2);
    assert!(log.events().iter().any(|event| matches!(
        event,
        ScanEvent::UnitSkipped { path, reason } if *path == link && reason == "symbolic link not followed"
    )));
    assert_eq!(log.skipped_units().count(), 2);
}

#[test]
fn nested_directories_are_walked_in_name_order() {
    let project = Project::new();
    project.write_surfaces();
    project.write("classes/b/Second.class", b"\xca\xfe");
    project.write("classes/a/z/First.class", b"\xca\xfe\xba");
    project.write("classes/a/Zero.class", b"");
    let (_, log) = scan_with(&project, &["com.acme.Store"], None);

    let skipped: Vec<&Path> = log.skipped_units().collect();
    assert_eq!(
        skipped,
        vec![
            project.classes().join("a/Zero.class"),
            project.classes().join("a/z/First.class"),
            project.classes().join("b/Second.class"),
        ]
    );
}

#[test]
fn sites_before_undecodable_bytecode_are_kept() {
    let project = Project::new();
    project.write_surfaces();
    project.write_class(
        "com.acme.Mixed",
        ClassWriter::new("com.acme.Mixed")
            .method(MethodWriter::new("broken", "()V").code(
                CodeWriter::new()
                    .line(3)
                    .invoke_interface("com.acme.Store", "clear", "()V")
                    .line(4)
                    .raw(&[0xcb])
                    .invoke_interface("com.acme.Store", "put", PUT_LONG),
            ))
            .method(MethodWriter::new("fine", "()V").code(
                CodeWriter::new()
                    .line(9)
                    .invoke_interface("com.acme.Store", "get", GET)
                    .return_void(),
            ))
            .finish(),
    );
    let (report, log) = scan_with(&project, &["com.acme.Store"], None);

    assert_eq!(
        sites(&report, "com.acme.Store", "clear", "()V"),
        vec!["com.acme.Mixed @ broken() # 3"]
    );
    assert!(sites(&report, "com.acme.Store", "put", PUT_LONG).is_empty());
    assert_eq!(
        sites(&report, "com.acme.Store", "get", GET),
        vec!["com.acme.Mixed @ fine() # 9"]
    );
    assert!(log.events().iter().any(|event| matches!(
        event,
        ScanEvent::MethodSkipped { unit, method, offset: 5, .. }
            if unit == "com.acme.Mixed" && method == "broken()"
    )));
    assert_eq!(log.units_scanned(), 1);
}

#[test]
fn no_surfaces_gives_an_empty_report() {
    let project = store_project();
    let (report, log) = scan_with(&project, &[], None);
    assert!(report.is_empty());
    assert!(log.events().contains(&ScanEvent::NoTargets));
}

// ── Fatal configuration errors ──────────────────────────────────────────────

#[test]
fn unknown_surface_is_fatal() {
    let project = store_project();
    let plan = ScanOptions {
        root: Some(project.classes()),
        surfaces: vec!["com.acme.Missing".into()],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let err = apicov::scan(&plan, &mut ScanLog::new()).unwrap_err();
    assert!(matches!(err, CoverageError::Configuration { .. }), "{err:?}");
}

#[test]
fn missing_root_is_fatal() {
    let project = Project::new();
    project.write_surfaces();
    let plan = ScanOptions {
        root: Some(project.path().join("nope")),
        surfaces: vec!["com.acme.Store".into()],
        declarations: vec![project.path().join("surfaces.toml")],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let err = apicov::scan(&plan, &mut ScanLog::new()).unwrap_err();
    assert!(matches!(err, CoverageError::Configuration { path: Some(_), .. }), "{err:?}");
}

#[test]
fn root_that_is_a_file_is_fatal() {
    let project = store_project();
    let plan = ScanOptions {
        root: Some(project.path().join("surfaces.toml")),
        surfaces: vec!["com.acme.Store".into()],
        declarations: vec![project.path().join("surfaces.toml")],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let err = apicov::scan(&plan, &mut ScanLog::new()).unwrap_err();
    assert!(matches!(err, CoverageError::Configuration { .. }), "{err:?}");
}

// ── Classpath surfaces ──────────────────────────────────────────────────────

#[test]
fn surfaces_resolve_from_compiled_classpath() {
    let project = Project::new();
    project.write(
        "api/com/acme/Queue.class",
        ClassWriter::interface("com.acme.Queue")
            .method(MethodWriter::new("offer", "(Ljava/lang/Object;)Z").access(0x0401))
            .method(MethodWriter::new("drain", "()V").access(0x0401))
            .method(MethodWriter::new("internal", "()V").access(0x0402))
            .finish(),
    );
    project.write_class(
        "com.acme.QueueTest",
        ClassWriter::new("com.acme.QueueTest")
            .method(MethodWriter::new("offers", "()V").code(
                CodeWriter::new()
                    .line(4)
                    .invoke_interface("com.acme.Queue", "offer", "(Ljava/lang/Object;)Z")
                    .raw(&[0x57])
                    .return_void(),
            ))
            .finish(),
    );

    let plan = ScanOptions {
        root: Some(project.classes()),
        surfaces: vec!["com.acme.Queue".into()],
        classpath: vec![project.path().join("api")],
        ..Default::default()
    }
    .resolve()
    .unwrap();
    let mut log = ScanLog::new();
    let report = apicov::scan(&plan, &mut log).unwrap();

    let keys: Vec<String> = report.keys().map(|(_, tuple)| tuple.to_string()).collect();
    assert_eq!(keys, vec!["drain@()V", "offer@(Ljava/lang/Object;)Z"]);
    assert_eq!(
        sites(&report, "com.acme.Queue", "offer", "(Ljava/lang/Object;)Z"),
        vec!["com.acme.QueueTest @ offers() # 4"]
    );
}
