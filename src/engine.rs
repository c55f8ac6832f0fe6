//! The scan: resolve surfaces, seed the report, walk the compiled tree and
//! record every call site that references a tracked method.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::classfile::{self, Annotation, ClassUnit};
use crate::descriptor::{self, OpenTypes};
use crate::diagnostics::{CoverageError, ScanEvent, ScanLog};
use crate::exclusion::MethodExclusion;
use crate::index::{SymbolIndex, build_index, index_bytes};
use crate::report::{CallSite, CoverageReport, MethodTuple};
use crate::surface::{SurfaceCatalog, SurfaceKind, TargetSurface, TrackedSurfaces};

/// Method name used for class-level annotation usages.
pub const CLASS_MEMBER: &str = "<class>";

pub struct CoverageEngine<'a> {
    catalog: &'a SurfaceCatalog,
    exclusion: &'a dyn MethodExclusion,
}

impl<'a> CoverageEngine<'a> {
    pub fn new(catalog: &'a SurfaceCatalog, exclusion: &'a dyn MethodExclusion) -> Self {
        Self { catalog, exclusion }
    }

    /// Scan every `.class` file under `root` for calls into the named surfaces.
    ///
    /// Fails only on configuration problems. Unreadable or corrupt units are
    /// recorded in `log` and skipped.
    pub fn run<S: AsRef<str>>(
        &self,
        names: &[S],
        root: &Path,
        log: &mut ScanLog,
    ) -> Result<CoverageReport, CoverageError> {
        check_root(root)?;
        let tracked = self.track(names, log)?;
        let mut report = tracked.seed_report();

        let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(CoverageError::io(root, err.into()));
                }
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    log.skip_unit(&path, err);
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "class") {
                continue;
            }
            if entry.path_is_symlink() {
                log.skip_unit(path, "symbolic link not followed");
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log.skip_unit(path, err);
                    continue;
                }
            };
            if !classfile::is_class_file(&bytes) {
                log.skip_unit(path, "not a class file");
                continue;
            }
            match index_bytes(&bytes, &tracked) {
                Ok((unit, index)) => {
                    log.unit_scanned();
                    record_unit(&tracked, &unit, &index, &mut report, log);
                }
                Err(err) => log.skip_unit(path, err),
            }
        }

        info!(
            units = log.units_scanned(),
            tracked = report.tracked_count(),
            covered = report.covered_count(),
            call_sites = report.call_site_count(),
            "scan complete"
        );
        Ok(report)
    }

    /// Resolve names, validate descriptors and apply the exclusion policy.
    pub fn track<S: AsRef<str>>(
        &self,
        names: &[S],
        log: &mut ScanLog,
    ) -> Result<TrackedSurfaces, CoverageError> {
        let mut tracked = TrackedSurfaces::new();
        for name in names {
            let decl = self.catalog.resolve(name.as_ref().trim())?;
            let mut methods = BTreeSet::new();
            for method in &decl.methods {
                descriptor::decode(&method.descriptor, &OpenTypes)
                    .map_err(|e| CoverageError::descriptor(decl.name.as_str(), method.name.as_str(), e))?;
                let tuple = MethodTuple::new(method.name.as_str(), method.descriptor.as_str());
                if let Some(reason) = self.exclusion.exclusion_reason(&decl.name, method) {
                    log.record(ScanEvent::MethodExcluded {
                        surface: decl.name.clone(),
                        method: tuple.to_string(),
                        reason,
                    });
                    continue;
                }
                methods.insert(tuple);
            }
            let has_members = !decl.methods.is_empty();
            if decl.kind == SurfaceKind::Annotation && !has_members {
                methods.insert(MethodTuple::usage_marker());
            }
            debug!(surface = %decl.name, kind = decl.kind.as_str(), methods = methods.len(), "tracking");
            tracked.insert(TargetSurface {
                name: decl.name,
                kind: decl.kind,
                supers: decl.supers,
                methods,
                has_members,
            });
        }
        if tracked.iter().all(|surface| surface.methods.is_empty()) {
            log.record(ScanEvent::NoTargets);
        }
        Ok(tracked)
    }
}

fn check_root(root: &Path) -> Result<(), CoverageError> {
    let metadata = std::fs::metadata(root).map_err(|e| {
        CoverageError::configuration_at(format!("cannot access scan root: {e}"), root)
    })?;
    if !metadata.is_dir() {
        return Err(CoverageError::configuration_at(
            "scan root is not a directory",
            root,
        ));
    }
    std::fs::read_dir(root).map_err(|e| {
        CoverageError::configuration_at(format!("cannot read scan root: {e}"), root)
    })?;
    Ok(())
}

/// Record the call sites and annotation usages of one parsed unit.
pub fn scan_unit(
    tracked: &TrackedSurfaces,
    unit: &ClassUnit,
    report: &mut CoverageReport,
    log: &mut ScanLog,
) {
    let index = build_index(unit, tracked);
    record_unit(tracked, unit, &index, report, log);
}

fn record_unit(
    tracked: &TrackedSurfaces,
    unit: &ClassUnit,
    index: &SymbolIndex<'_>,
    report: &mut CoverageReport,
    log: &mut ScanLog,
) {
    let annotations = tracked.has_annotations();
    if index.is_empty() && !annotations {
        return;
    }

    if annotations {
        record_annotations(tracked, &unit.name, CLASS_MEMBER, &unit.annotations, None, report);
    }

    for method in unit.methods() {
        let Some(body) = method.code() else {
            continue;
        };
        let signature = method.signature();

        // Sites decoded before a bad instruction are kept.
        let mut offset = 0;
        for instruction in body.instructions() {
            let instruction = match instruction {
                Ok(instruction) => instruction,
                Err(err) => {
                    log.record(ScanEvent::MethodSkipped {
                        unit: unit.name.clone(),
                        method: signature.clone(),
                        offset,
                        reason: err.to_string(),
                    });
                    break;
                }
            };
            offset = instruction.offset + instruction.len;
            let Some(entry) = instruction.invoked_slot().and_then(|slot| index.get(slot)) else {
                continue;
            };
            let site = CallSite::new(
                unit.name.as_str(),
                signature.as_str(),
                body.line_for(instruction.offset),
            );
            report.record(&entry.surface.name, entry.tuple, site);
        }

        if annotations {
            // Method annotations sit above the declaration, parameter
            // annotations on the line before the body.
            let first_line = body.first_line();
            let above = first_line.and_then(|line| line.checked_sub(2)).filter(|&line| line > 0);
            let before = first_line.and_then(|line| line.checked_sub(1)).filter(|&line| line > 0);
            record_annotations(tracked, &unit.name, &signature, &method.annotations, above, report);
            for params in &method.parameter_annotations {
                record_annotations(tracked, &unit.name, &signature, params, before, report);
            }
        }
    }
}

fn record_annotations(
    tracked: &TrackedSurfaces,
    unit: &str,
    member: &str,
    annotations: &[Annotation],
    line: Option<u32>,
    report: &mut CoverageReport,
) {
    for annotation in annotations {
        let Some(surface) = tracked.get(&annotation.type_name) else {
            continue;
        };
        if !surface.is_annotation() {
            continue;
        }
        let site = CallSite::new(unit, member, line);
        if surface.has_members {
            for tuple in &surface.methods {
                if annotation.sets(&tuple.name) {
                    report.record(&surface.name, tuple, site.clone());
                }
            }
        } else {
            report.record(&surface.name, &MethodTuple::usage_marker(), site);
        }
    }
}
