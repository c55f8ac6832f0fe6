use std::io::{self, Write};

use super::{Printer, UNCOVERED};
use crate::report::{CallSite, CoverageReport};

const STYLE: &str = r#"body {
    font-family: Arial, sans-serif;
    font-size: 12px;
}
div.apiClass {
    background-color: #dee3e9;
    border: 1px solid #9eadc0;
    margin: 5px 5px 50px 5px;
    padding: 2px 5px;
}
div.apiClass h2 span.ratio {
    font-weight: normal;
    color: #4d5d70;
}
ul.blockList {
    margin: 10px 0 10px 0;
    padding: 0;
}
ul.blockList li.blockList {
    list-style: none;
    margin-bottom: 5px;
    padding: 5px 20px 5px 10px;
    border: 1px solid #9eadc0;
    background-color: #f9f9f9;
}
ul.blockList li.blockList h3 {
    margin: 3px;
    color: black;
    font-weight: bold;
}
ul.blockList ul.blockList {
    padding: 5px 5px 5px 8px;
    background-color: #ffffff;
    border: 1px solid #9eadc0;
}
ul.blockList ul.blockList li.blockList {
    border: 0;
    padding: 3px;
    margin: 0;
    background-color: #ffffff;
}
ul.blockList ul.blockList li.uncovered {
    color: #b00020;
    font-weight: bold;
}
"#;

/// Self-contained HTML page, one block per surface.
#[derive(Debug, Clone)]
pub struct HtmlPrinter {
    title: String,
    link_base: Option<String>,
}

impl HtmlPrinter {
    pub fn new(title: impl Into<String>, link_base: Option<String>) -> Self {
        Self {
            title: title.into(),
            link_base: link_base.map(|base| base.trim_end_matches('/').to_string()),
        }
    }

    fn call_site(&self, site: &CallSite) -> String {
        let mut label = format!("{}.java", site.simple_unit_name().split('$').next().unwrap_or_default());
        if let Some(line) = site.line {
            label.push_str(&format!(":{line}"));
        }
        // Without a base the link is relative to the report's own location.
        let mut url = match &self.link_base {
            Some(base) => format!("{base}/{}", site.source_path()),
            None => site.source_path(),
        };
        if let Some(line) = site.line {
            url.push_str(&format!("#L{line}"));
        }
        format!(
            "{} (<a href=\"{}\" target=\"_top\">{}</a>)",
            esc(&format!("{}.{}", site.unit, site.method)),
            esc(&url),
            esc(&label)
        )
    }
}

impl Printer for HtmlPrinter {
    fn print(&self, report: &CoverageReport, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html>")?;
        writeln!(out, "<head>")?;
        writeln!(out, "<meta charset=\"utf-8\">")?;
        writeln!(out, "<title>{} API coverage</title>", esc(&self.title))?;
        writeln!(out, "<style type=\"text/css\">\n{STYLE}</style>")?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<h1>{}</h1>", esc(&self.title))?;

        for (surface, calls) in report.surfaces() {
            let covered = calls.values().filter(|sites| !sites.is_empty()).count();
            writeln!(out, "<div class=\"apiClass\">")?;
            writeln!(
                out,
                "<h2>{} <span class=\"ratio\">{covered}/{}</span></h2>",
                esc(surface),
                calls.len()
            )?;
            writeln!(out, "<ul class=\"blockList\">")?;
            for (tuple, sites) in calls {
                write!(
                    out,
                    "<li class=\"blockList\"><h3>{}</h3><ul class=\"blockList\">",
                    esc(&tuple.full_signature())
                )?;
                if sites.is_empty() {
                    write!(out, "<li class=\"blockList uncovered\">{UNCOVERED}</li>")?;
                }
                for site in sites {
                    write!(out, "<li class=\"blockList\">{}</li>", self.call_site(site))?;
                }
                writeln!(out, "</ul></li>")?;
            }
            writeln!(out, "</ul>")?;
            writeln!(out, "</div>")?;
        }

        writeln!(out, "</body>")?;
        writeln!(out, "</html>")
    }
}

pub(crate) fn esc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
