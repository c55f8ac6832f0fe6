//! Recoverable scan events.
//!
//! The engine never swallows a per-unit failure: each one lands here and is
//! forwarded to `tracing` as it is recorded.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::exclusion::ExclusionReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A file that could not be read or parsed as a class file.
    UnitSkipped { path: PathBuf, reason: String },
    /// A method whose bytecode stopped decoding at `offset`. Call sites
    /// before it were recorded; the rest of the unit was scanned.
    MethodSkipped {
        unit: String,
        method: String,
        offset: usize,
        reason: String,
    },
    /// A surface method dropped by the exclusion policy.
    MethodExcluded {
        surface: String,
        method: String,
        reason: ExclusionReason,
    },
    /// No method survived seeding, so the report will be empty.
    NoTargets,
}

#[derive(Debug, Default)]
pub struct ScanLog {
    events: Vec<ScanEvent>,
    units_scanned: usize,
}

impl ScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: ScanEvent) {
        match &event {
            ScanEvent::UnitSkipped { path, reason } => {
                warn!(path = %path.display(), %reason, "skipping unit");
            }
            ScanEvent::MethodSkipped {
                unit,
                method,
                offset,
                reason,
            } => {
                warn!(%unit, %method, offset, %reason, "skipping rest of method body");
            }
            ScanEvent::MethodExcluded {
                surface,
                method,
                reason,
            } => {
                debug!(%surface, %method, %reason, "excluded");
            }
            ScanEvent::NoTargets => warn!("no tracked methods; the report will be empty"),
        }
        self.events.push(event);
    }

    pub(crate) fn skip_unit(&mut self, path: &Path, reason: impl ToString) {
        self.record(ScanEvent::UnitSkipped {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }

    pub(crate) fn unit_scanned(&mut self) {
        self.units_scanned += 1;
    }

    pub fn units_scanned(&self) -> usize {
        self.units_scanned
    }

    pub fn events(&self) -> &[ScanEvent] {
        &self.events
    }

    pub fn skipped_units(&self) -> impl Iterator<Item = &Path> {
        self.events.iter().filter_map(|event| match event {
            ScanEvent::UnitSkipped { path, .. } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn exclusions(&self) -> impl Iterator<Item = (&str, &str, ExclusionReason)> {
        self.events.iter().filter_map(|event| match event {
            ScanEvent::MethodExcluded {
                surface,
                method,
                reason,
            } => Some((surface.as_str(), method.as_str(), *reason)),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
