//! `apicov.toml`, surface list files, and their merge with command-line options.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::diagnostics::CoverageError;
use crate::printer::{PrintOptions, ReportFormat};

pub const CONFIG_FILE: &str = "apicov.toml";

/// Surface list looked up in the scan root when none is given.
pub const SURFACES_FILE: &str = "coverage.txt";

/// Exclusion list looked up in the scan root when none is given.
pub const EXCLUSIONS_FILE: &str = "exclusions.txt";

/// File name, less extension, of a report written into a directory.
pub const REPORT_STEM: &str = "apicov-report";

/// Scan settings from one source (project file or command line). Unset
/// values are `None` or empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOptions {
    pub root: Option<PathBuf>,
    pub surfaces: Vec<String>,
    pub surfaces_file: Option<PathBuf>,
    pub exclusions: Option<PathBuf>,
    pub declarations: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub keep_object_methods: bool,
    pub format: Option<ReportFormat>,
    pub output: Option<PathBuf>,
    pub title: Option<String>,
    pub link_base: Option<String>,
}

/// Fully resolved settings for one scan.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub root: PathBuf,
    pub surfaces: Vec<String>,
    pub exclusions: Option<PathBuf>,
    pub declarations: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub keep_object_methods: bool,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub print: PrintOptions,
}

// ---- TOML deserialization types ----

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    scan: TomlScan,
    #[serde(default)]
    report: TomlReport,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlScan {
    root: Option<PathBuf>,
    #[serde(default)]
    surfaces: Vec<String>,
    surfaces_file: Option<PathBuf>,
    exclusions: Option<PathBuf>,
    #[serde(default)]
    declarations: Vec<PathBuf>,
    #[serde(default)]
    classpath: Vec<PathBuf>,
    #[serde(default)]
    keep_object_methods: bool,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlReport {
    format: Option<ReportFormat>,
    output: Option<PathBuf>,
    title: Option<String>,
    link_base: Option<String>,
}

impl ScanOptions {
    /// Read a project file. Relative paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self, CoverageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoverageError::manifest(format!("{CONFIG_FILE}: could not read file: {e}"), path)
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, CoverageError> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| CoverageError::toml(&e, path))?;
        let base = path.parent().unwrap_or(Path::new("."));
        let rebase = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        if config.scan.surfaces.iter().any(|s| s.trim().is_empty()) {
            return Err(CoverageError::manifest(
                format!("{CONFIG_FILE}: surface names must not be empty"),
                path,
            ));
        }

        Ok(Self {
            root: config.scan.root.map(rebase),
            surfaces: config.scan.surfaces,
            surfaces_file: config.scan.surfaces_file.map(rebase),
            exclusions: config.scan.exclusions.map(rebase),
            declarations: config.scan.declarations.into_iter().map(rebase).collect(),
            classpath: config.scan.classpath.into_iter().map(rebase).collect(),
            keep_object_methods: config.scan.keep_object_methods,
            format: config.report.format,
            output: config.report.output.map(rebase),
            title: config.report.title,
            link_base: config.report.link_base,
        })
    }

    /// Layer `overrides` on top of `self`: single values are replaced, lists
    /// are concatenated.
    pub fn merge(mut self, overrides: ScanOptions) -> Self {
        self.root = overrides.root.or(self.root);
        self.surfaces.extend(overrides.surfaces);
        self.surfaces_file = overrides.surfaces_file.or(self.surfaces_file);
        self.exclusions = overrides.exclusions.or(self.exclusions);
        self.declarations.extend(overrides.declarations);
        self.classpath.extend(overrides.classpath);
        self.keep_object_methods |= overrides.keep_object_methods;
        self.format = overrides.format.or(self.format);
        self.output = overrides.output.or(self.output);
        self.title = overrides.title.or(self.title);
        self.link_base = overrides.link_base.or(self.link_base);
        self
    }

    /// Apply defaults and read the surface list file.
    pub fn resolve(self) -> Result<ScanPlan, CoverageError> {
        let root = self
            .root
            .ok_or_else(|| CoverageError::configuration("no scan root given"))?;

        let mut surfaces = self.surfaces;
        let surfaces_file = match self.surfaces_file {
            Some(file) => Some(file),
            None => Some(root.join(SURFACES_FILE)).filter(|file| file.is_file()),
        };
        if let Some(file) = surfaces_file {
            let text = std::fs::read_to_string(&file).map_err(|e| CoverageError::io(&file, e))?;
            surfaces.extend(parse_surface_list(&text));
        }
        let mut seen = HashSet::new();
        surfaces.retain(|name| seen.insert(name.clone()));

        let exclusions = self
            .exclusions
            .or_else(|| Some(root.join(EXCLUSIONS_FILE)).filter(|file| file.is_file()));

        let title = self.title.unwrap_or_else(|| {
            root.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "apicov".to_string())
        });

        let format = self.format.unwrap_or_default();
        // A directory output gets a default file name for the chosen format.
        let output = self.output.map(|path| {
            if path.is_dir() {
                path.join(format!("{REPORT_STEM}.{}", format.extension()))
            } else {
                path
            }
        });

        Ok(ScanPlan {
            root,
            surfaces,
            exclusions,
            declarations: self.declarations,
            classpath: self.classpath,
            keep_object_methods: self.keep_object_methods,
            format,
            output,
            print: PrintOptions {
                title,
                link_base: self.link_base,
            },
        })
    }
}

/// One surface name per line; blank lines and `#` comments are ignored.
pub fn parse_surface_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
