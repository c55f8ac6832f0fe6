//! Report renderers.

mod csv;
mod html;
mod json;
mod text;

pub use csv::CsvPrinter;
pub use html::HtmlPrinter;
pub use json::{JsonCallSite, JsonCoverageReport, JsonMethod, JsonPrinter, JsonSummary, JsonSurface};
pub use text::TextPrinter;

use std::io::{self, Write};

use serde::Deserialize;

use crate::report::CoverageReport;

/// Marker printed for a tracked method with no call sites.
pub const UNCOVERED: &str = "UNCOVERED";

pub trait Printer {
    fn print(&self, report: &CoverageReport, out: &mut dyn Write) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Csv,
    Html,
    Json,
}

/// Settings shared by the printers that need them.
#[derive(Debug, Clone, Default)]
pub struct PrintOptions {
    /// HTML page heading.
    pub title: String,
    /// Prefix for call-site source links; `None` links relative to the report.
    pub link_base: Option<String>,
}

impl ReportFormat {
    pub fn printer(self, options: &PrintOptions) -> Box<dyn Printer> {
        match self {
            ReportFormat::Text => Box::new(TextPrinter::new()),
            ReportFormat::Csv => Box::new(CsvPrinter),
            ReportFormat::Html => Box::new(HtmlPrinter::new(
                options.title.clone(),
                options.link_base.clone(),
            )),
            ReportFormat::Json => Box::new(JsonPrinter),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
        }
    }
}

/// Render `report` into a string.
pub fn render(printer: &dyn Printer, report: &CoverageReport) -> io::Result<String> {
    let mut buf = Vec::new();
    printer.print(report, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
