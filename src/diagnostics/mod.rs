mod scan_log;

pub use scan_log::{ScanEvent, ScanLog};

use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classfile::UnitError;
use crate::descriptor::DescriptorError;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("Configuration error: {msg}")]
    Configuration { msg: String, path: Option<PathBuf> },

    #[error("Manifest error: {msg}")]
    Manifest {
        msg: String,
        path: PathBuf,
        span: Option<Range<usize>>,
    },

    #[error("Malformed descriptor for {surface}.{method}: {source}")]
    Descriptor {
        surface: String,
        method: String,
        source: DescriptorError,
    },

    #[error("Corrupt class file {}: {source}", path.display())]
    Unit { path: PathBuf, source: UnitError },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CoverageError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            msg: msg.into(),
            path: None,
        }
    }

    pub fn configuration_at(msg: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Configuration {
            msg: msg.into(),
            path: Some(path.into()),
        }
    }

    pub fn manifest(msg: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Manifest {
            msg: msg.into(),
            path: path.into(),
            span: None,
        }
    }

    /// Wrap a TOML parse error, keeping its byte span for rendering.
    pub fn toml(err: &toml::de::Error, path: &Path) -> Self {
        Self::Manifest {
            msg: err.message().to_string(),
            path: path.to_path_buf(),
            span: err.span(),
        }
    }

    pub fn descriptor(
        surface: impl Into<String>,
        method: impl Into<String>,
        source: DescriptorError,
    ) -> Self {
        Self::Descriptor {
            surface: surface.into(),
            method: method.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Render a CoverageError for the terminal. Manifest errors with a known span
/// are shown against the file's source with ariadne.
pub fn render_error(err: &CoverageError) {
    use ariadne::{Label, Report, ReportKind, Source};

    match err {
        CoverageError::Manifest {
            msg,
            path,
            span: Some(span),
        } => {
            let Ok(source) = std::fs::read_to_string(path) else {
                eprintln!("error[manifest]: {msg}");
                eprintln!("  --> {}", path.display());
                return;
            };
            let rendered = Report::build(ReportKind::Error, (), span.start)
                .with_message(format!("invalid {}", path.display()))
                .with_label(Label::new(span.clone()).with_message(msg))
                .finish()
                .eprint(Source::from(source));
            if rendered.is_err() {
                eprintln!("error[manifest]: {msg}");
            }
        }
        CoverageError::Manifest {
            msg,
            path,
            span: None,
        } => {
            eprintln!("error[manifest]: {msg}");
            eprintln!("  --> {}", path.display());
        }
        CoverageError::Configuration {
            msg,
            path: Some(path),
        } => {
            eprintln!("error: {msg}");
            eprintln!("  --> {}", path.display());
        }
        other => eprintln!("error: {other}"),
    }
}
