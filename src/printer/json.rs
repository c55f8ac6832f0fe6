use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::Printer;
use crate::report::{CoverageReport, SurfaceStats};

/// Structured JSON report for programmatic consumption.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonCoverageReport {
    pub summary: JsonSummary,
    pub surfaces: Vec<JsonSurface>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSummary {
    pub tracked_methods: usize,
    pub covered_methods: usize,
    pub call_sites: usize,
    pub percent: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSurface {
    pub name: String,
    pub summary: JsonSummary,
    pub methods: Vec<JsonMethod>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMethod {
    pub name: String,
    pub descriptor: String,
    pub signature: String,
    pub covered: bool,
    pub call_sites: Vec<JsonCallSite>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonCallSite {
    pub unit: String,
    pub method: String,
    pub line: Option<u32>,
}

impl From<&SurfaceStats> for JsonSummary {
    fn from(stats: &SurfaceStats) -> Self {
        Self {
            tracked_methods: stats.tracked,
            covered_methods: stats.covered,
            call_sites: stats.call_sites,
            percent: stats.percent(),
        }
    }
}

impl JsonCoverageReport {
    pub fn from_report(report: &CoverageReport) -> Self {
        let summary = report.summary();
        let surfaces = report
            .surfaces()
            .zip(&summary.surfaces)
            .map(|((name, calls), stats)| JsonSurface {
                name: name.to_string(),
                summary: stats.into(),
                methods: calls
                    .iter()
                    .map(|(tuple, sites)| JsonMethod {
                        name: tuple.name.clone(),
                        descriptor: tuple.descriptor.clone(),
                        signature: tuple.signature(),
                        covered: !sites.is_empty(),
                        call_sites: sites
                            .iter()
                            .map(|site| JsonCallSite {
                                unit: site.unit.clone(),
                                method: site.method.clone(),
                                line: site.line,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            summary: (&summary.total).into(),
            surfaces,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPrinter;

impl Printer for JsonPrinter {
    fn print(&self, report: &CoverageReport, out: &mut dyn Write) -> io::Result<()> {
        let json = JsonCoverageReport::from_report(report);
        serde_json::to_writer_pretty(&mut *out, &json).map_err(io::Error::other)?;
        writeln!(out)
    }
}
