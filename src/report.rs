//! The coverage report: which tracked methods are called, and from where.
//!
//! Everything is kept in ordered maps so that printers produce stable output
//! without sorting.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::descriptor;

// ── Report keys ─────────────────────────────────────────────────────────────

/// A method identified by name and exact descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodTuple {
    pub name: String,
    pub descriptor: String,
}

impl MethodTuple {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Stand-in tuple for an annotation type that has no members.
    pub fn usage_marker() -> Self {
        Self::new("<usage>", "()V")
    }

    pub fn is_usage_marker(&self) -> bool {
        self.name == "<usage>" && self.descriptor == "()V"
    }

    /// `name(int, java.lang.String)`, or `name@descriptor` if the descriptor
    /// does not parse.
    pub fn signature(&self) -> String {
        descriptor::humanize(&self.name, &self.descriptor).unwrap_or_else(|_| self.to_string())
    }

    /// `String name(int)`.
    pub fn full_signature(&self) -> String {
        if self.is_usage_marker() {
            return self.name.clone();
        }
        descriptor::humanize_full(&self.name, &self.descriptor).unwrap_or_else(|_| self.to_string())
    }
}

impl fmt::Display for MethodTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.descriptor)
    }
}

/// One place in the scanned code that uses a tracked method.
///
/// Ordered by unit, then method, then line; an unknown line sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSite {
    /// Dotted name of the unit containing the call.
    pub unit: String,
    /// Human-readable signature of the calling method.
    pub method: String,
    pub line: Option<u32>,
}

impl CallSite {
    pub fn new(unit: impl Into<String>, method: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            unit: unit.into(),
            method: method.into(),
            line,
        }
    }

    pub fn simple_unit_name(&self) -> &str {
        self.unit.rsplit('.').next().unwrap_or(&self.unit)
    }

    /// Path of the source file that declares the unit, relative to a source
    /// root: `com/acme/FooTest.java` for `com.acme.FooTest$Inner`.
    pub fn source_path(&self) -> String {
        let outer = self.unit.split('$').next().unwrap_or(&self.unit);
        format!("{}.java", outer.replace('.', "/"))
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} @ {} # {line}", self.unit, self.method),
            None => write!(f, "{} @ {} # ?", self.unit, self.method),
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────────────

pub type MethodCalls = BTreeMap<MethodTuple, BTreeSet<CallSite>>;

/// `surface name -> (method -> call sites)`.
///
/// Only the engine mutates a report: it seeds every tracked method first, and
/// recording never adds a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    surfaces: BTreeMap<String, MethodCalls>,
}

impl CoverageReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed_surface(&mut self, surface: &str) {
        self.surfaces.entry(surface.to_string()).or_default();
    }

    pub(crate) fn seed(&mut self, surface: &str, tuple: MethodTuple) {
        self.surfaces
            .entry(surface.to_string())
            .or_default()
            .entry(tuple)
            .or_default();
    }

    /// Add a call site to an already seeded method. Returns false when the
    /// method is not tracked or the site was already recorded.
    pub(crate) fn record(&mut self, surface: &str, tuple: &MethodTuple, site: CallSite) -> bool {
        match self.surfaces.get_mut(surface).and_then(|calls| calls.get_mut(tuple)) {
            Some(sites) => sites.insert(site),
            None => false,
        }
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (&str, &MethodCalls)> {
        self.surfaces.iter().map(|(name, calls)| (name.as_str(), calls))
    }

    pub fn surface(&self, name: &str) -> Option<&MethodCalls> {
        self.surfaces.get(name)
    }

    pub fn calls(&self, surface: &str, tuple: &MethodTuple) -> Option<&BTreeSet<CallSite>> {
        self.surfaces.get(surface)?.get(tuple)
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.values().all(|calls| calls.is_empty())
    }

    pub fn tracked_count(&self) -> usize {
        self.surfaces.values().map(|calls| calls.len()).sum()
    }

    pub fn covered_count(&self) -> usize {
        self.surfaces
            .values()
            .flat_map(|calls| calls.values())
            .filter(|sites| !sites.is_empty())
            .count()
    }

    pub fn call_site_count(&self) -> usize {
        self.surfaces
            .values()
            .flat_map(|calls| calls.values())
            .map(|sites| sites.len())
            .sum()
    }

    /// Every `(surface, method)` key, in report order.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &MethodTuple)> {
        self.surfaces
            .iter()
            .flat_map(|(name, calls)| calls.keys().map(move |tuple| (name.as_str(), tuple)))
    }

    pub fn summary(&self) -> CoverageSummary {
        let surfaces: Vec<SurfaceStats> = self
            .surfaces
            .iter()
            .map(|(name, calls)| SurfaceStats {
                surface: name.clone(),
                tracked: calls.len(),
                covered: calls.values().filter(|sites| !sites.is_empty()).count(),
                call_sites: calls.values().map(|sites| sites.len()).sum(),
            })
            .collect();
        let total = SurfaceStats {
            surface: "Total".to_string(),
            tracked: surfaces.iter().map(|s| s.tracked).sum(),
            covered: surfaces.iter().map(|s| s.covered).sum(),
            call_sites: surfaces.iter().map(|s| s.call_sites).sum(),
        };
        CoverageSummary { surfaces, total }
    }
}

// ── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceStats {
    pub surface: String,
    pub tracked: usize,
    pub covered: usize,
    pub call_sites: usize,
}

impl SurfaceStats {
    /// Share of tracked methods with at least one call site; 100% when
    /// nothing is tracked.
    pub fn percent(&self) -> f64 {
        if self.tracked > 0 {
            (self.covered as f64 / self.tracked as f64) * 100.0
        } else {
            100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSummary {
    pub surfaces: Vec<SurfaceStats>,
    pub total: SurfaceStats,
}
