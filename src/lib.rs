pub mod classfile;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod engine;
pub mod exclusion;
pub mod index;
pub mod printer;
pub mod report;
pub mod surface;

use std::io::Write;

use config::ScanPlan;
use diagnostics::{CoverageError, ScanLog};
use engine::CoverageEngine;
use exclusion::{BaseExclusion, FileExclusion};
use report::CoverageReport;
use surface::SurfaceCatalog;

/// Build the surface catalog described by a plan (declaration files, then classpath).
pub fn build_catalog(plan: &ScanPlan) -> Result<SurfaceCatalog, CoverageError> {
    let mut catalog = SurfaceCatalog::new();
    for path in &plan.declarations {
        catalog.load_declarations(path)?;
    }
    for dir in &plan.classpath {
        if !dir.is_dir() {
            return Err(CoverageError::configuration_at(
                "classpath entry is not a directory",
                dir,
            ));
        }
        catalog.add_classpath(dir);
    }
    tracing::debug!(
        declared = catalog.declared().count(),
        classpath = plan.classpath.len(),
        "surface catalog ready"
    );
    Ok(catalog)
}

/// The exclusion policy described by a plan.
pub fn build_exclusion(plan: &ScanPlan) -> Result<FileExclusion, CoverageError> {
    let base = if plan.keep_object_methods {
        BaseExclusion::new()
    } else {
        BaseExclusion::with_object_methods()
    };
    match &plan.exclusions {
        Some(path) => FileExclusion::load(base, path),
        None => Ok(FileExclusion::parse(base, "")),
    }
}

/// Run a full scan. With no surfaces the report is empty and a `NoTargets`
/// event is logged.
pub fn scan(plan: &ScanPlan, log: &mut ScanLog) -> Result<CoverageReport, CoverageError> {
    let catalog = build_catalog(plan)?;
    let exclusion = build_exclusion(plan)?;
    CoverageEngine::new(&catalog, &exclusion).run(&plan.surfaces, &plan.root, log)
}

/// Render a report with the plan's printer to its output file, or stdout.
pub fn write_report(plan: &ScanPlan, report: &CoverageReport) -> Result<(), CoverageError> {
    let printer = plan.format.printer(&plan.print);
    match &plan.output {
        Some(path) => {
            let mut file = std::io::BufWriter::new(
                std::fs::File::create(path).map_err(|e| CoverageError::io(path, e))?,
            );
            printer
                .print(report, &mut file)
                .and_then(|_| file.flush())
                .map_err(|e| CoverageError::io(path, e))
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            printer
                .print(report, &mut lock)
                .and_then(|_| lock.flush())
                .map_err(|e| CoverageError::io("<stdout>", e))
        }
    }
}
