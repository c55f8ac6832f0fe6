use std::io::{self, Write};

use super::Printer;
use crate::report::CoverageReport;

pub const HEADER: &str = "Interface/Class, Method, Call Count, Status";

/// One row per tracked method.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvPrinter;

impl Printer for CsvPrinter {
    fn print(&self, report: &CoverageReport, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{HEADER}")?;
        for (surface, calls) in report.surfaces() {
            for (tuple, sites) in calls {
                let status = if sites.is_empty() { "uncovered" } else { "covered" };
                writeln!(
                    out,
                    "{}, {}, {}, {status}",
                    field(surface),
                    field(&tuple.to_string()),
                    sites.len(),
                )?;
            }
        }
        Ok(())
    }
}

/// Quote a field only when it would otherwise split or break a row.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
