use std::io::{self, Write};

use super::{Printer, UNCOVERED};
use crate::report::{CoverageReport, SurfaceStats};

/// Plain-text listing followed by a coverage summary table.
#[derive(Debug, Clone, Copy)]
pub struct TextPrinter {
    summary: bool,
}

impl Default for TextPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextPrinter {
    pub fn new() -> Self {
        Self { summary: true }
    }

    pub fn without_summary() -> Self {
        Self { summary: false }
    }
}

impl Printer for TextPrinter {
    fn print(&self, report: &CoverageReport, out: &mut dyn Write) -> io::Result<()> {
        for (surface, calls) in report.surfaces() {
            writeln!(out, "Interface / Class: {surface}")?;
            for (tuple, sites) in calls {
                writeln!(out, "\t{tuple}")?;
                if sites.is_empty() {
                    writeln!(out, "\t\t{UNCOVERED}")?;
                }
                for site in sites {
                    writeln!(out, "\t\t{site}")?;
                }
            }
            writeln!(out)?;
        }
        if self.summary {
            print_summary(report, out)?;
        }
        Ok(())
    }
}

fn print_summary(report: &CoverageReport, out: &mut dyn Write) -> io::Result<()> {
    let summary = report.summary();
    writeln!(out, "Coverage:")?;
    for stats in &summary.surfaces {
        summary_row(stats, out)?;
    }
    if !summary.surfaces.is_empty() {
        summary_row(&summary.total, out)?;
    }
    Ok(())
}

fn summary_row(stats: &SurfaceStats, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "  {:<40} {:>5.1}%  ({}/{} methods, {} call sites)",
        stats.surface,
        stats.percent(),
        stats.covered,
        stats.tracked,
        stats.call_sites,
    )
}
