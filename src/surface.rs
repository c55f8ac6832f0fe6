//! Target surfaces: the API types whose methods are measured.
//!
//! Surfaces are looked up in a static [`SurfaceCatalog`] built from TOML
//! declaration files and classpath directories of compiled types. The engine
//! narrows each resolved [`SurfaceDecl`] to a [`TargetSurface`] holding only
//! the methods that survive the exclusion policy.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::classfile::{self, AccessFlags, ClassUnit, MethodDecl};
use crate::descriptor::{self, JavaType};
use crate::diagnostics::CoverageError;
use crate::report::{CoverageReport, MethodTuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    #[default]
    Class,
    Interface,
    Annotation,
}

impl SurfaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceKind::Class => "class",
            SurfaceKind::Interface => "interface",
            SurfaceKind::Annotation => "annotation",
        }
    }
}

/// A target type with every method it declares.
#[derive(Debug, Clone)]
pub struct SurfaceDecl {
    pub name: String,
    pub kind: SurfaceKind,
    /// Super class and implemented or extended interfaces.
    pub supers: Vec<String>,
    pub methods: Vec<MethodDecl>,
}

impl SurfaceDecl {
    pub fn from_unit(unit: ClassUnit) -> Self {
        let kind = if unit.is_annotation() {
            SurfaceKind::Annotation
        } else if unit.is_interface() {
            SurfaceKind::Interface
        } else {
            SurfaceKind::Class
        };
        let mut supers = Vec::new();
        if kind == SurfaceKind::Class {
            supers.extend(unit.super_name.clone());
        }
        if kind != SurfaceKind::Annotation {
            supers.extend(unit.interfaces.iter().cloned());
        }
        Self {
            name: unit.name.clone(),
            kind,
            supers,
            methods: unit.into_methods(),
        }
    }
}

/// Every surface the engine may be asked to track.
#[derive(Debug, Default)]
pub struct SurfaceCatalog {
    declared: BTreeMap<String, SurfaceDecl>,
    classpath: Vec<PathBuf>,
}

impl SurfaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared surfaces take precedence over the classpath.
    pub fn insert(&mut self, decl: SurfaceDecl) {
        self.declared.insert(decl.name.clone(), decl);
    }

    pub fn add_classpath(&mut self, dir: impl Into<PathBuf>) {
        self.classpath.push(dir.into());
    }

    pub fn declared(&self) -> impl Iterator<Item = &SurfaceDecl> {
        self.declared.values()
    }

    pub fn load_declarations(&mut self, path: &Path) -> Result<usize, CoverageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoverageError::manifest(format!("could not read declarations: {e}"), path)
        })?;
        self.parse_declarations(&content, path)
    }

    /// Parse a declarations file and add its surfaces. Returns how many were added.
    pub fn parse_declarations(&mut self, content: &str, path: &Path) -> Result<usize, CoverageError> {
        let file: TomlDeclarations =
            toml::from_str(content).map_err(|e| CoverageError::toml(&e, path))?;

        let mut seen = HashSet::new();
        for surface in &file.surface {
            if !seen.insert(surface.name.as_str()) {
                return Err(CoverageError::manifest(
                    format!("surface '{}' is declared twice", surface.name),
                    path,
                ));
            }
        }

        let count = file.surface.len();
        for surface in file.surface {
            let decl = surface.into_decl(path)?;
            self.insert(decl);
        }
        Ok(count)
    }

    /// Find a surface by dotted name.
    pub fn resolve(&self, name: &str) -> Result<SurfaceDecl, CoverageError> {
        if let Some(decl) = self.declared.get(name) {
            return Ok(decl.clone());
        }
        let relative = format!("{}.class", name.replace('.', "/"));
        for dir in &self.classpath {
            let path = dir.join(&relative);
            if !path.is_file() {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|e| CoverageError::io(&path, e))?;
            let unit = classfile::open_unit(&bytes)
                .map_err(|source| CoverageError::Unit { path: path.clone(), source })?;
            if unit.name != name {
                return Err(CoverageError::configuration_at(
                    format!("expected '{name}' but the class file declares '{}'", unit.name),
                    path,
                ));
            }
            return Ok(SurfaceDecl::from_unit(unit));
        }
        Err(CoverageError::configuration(format!(
            "unknown surface '{name}': not declared and not found on the classpath"
        )))
    }
}

// ---- TOML deserialization types ----

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlDeclarations {
    #[serde(default)]
    surface: Vec<TomlSurface>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSurface {
    name: String,
    #[serde(default)]
    kind: SurfaceKind,
    #[serde(default)]
    extends: Vec<String>,
    #[serde(default)]
    method: Vec<TomlMethod>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlMethod {
    name: String,
    descriptor: Option<String>,
    params: Option<Vec<String>>,
    returns: Option<String>,
    #[serde(default)]
    access: TomlAccess,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum TomlAccess {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

impl TomlAccess {
    fn flags(self) -> AccessFlags {
        AccessFlags(match self {
            TomlAccess::Public => AccessFlags::PUBLIC,
            TomlAccess::Protected => AccessFlags::PROTECTED,
            TomlAccess::Package => 0,
            TomlAccess::Private => AccessFlags::PRIVATE,
        })
    }
}

impl TomlSurface {
    fn into_decl(self, path: &Path) -> Result<SurfaceDecl, CoverageError> {
        if self.name.trim().is_empty() {
            return Err(CoverageError::manifest("surface name must not be empty", path));
        }
        let mut methods = Vec::with_capacity(self.method.len());
        for method in self.method {
            let descriptor = match (&method.descriptor, &method.params, &method.returns) {
                (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                    return Err(CoverageError::manifest(
                        format!(
                            "{}.{}: give either 'descriptor' or 'params'/'returns', not both",
                            self.name, method.name
                        ),
                        path,
                    ));
                }
                (Some(descriptor), None, None) => descriptor.clone(),
                (None, params, returns) => {
                    source_descriptor(params.as_deref(), returns.as_deref()).map_err(|e| {
                        CoverageError::descriptor(self.name.as_str(), method.name.as_str(), e)
                    })?
                }
            };
            let mut decl = MethodDecl::new(method.name, descriptor, method.access.flags());
            decl.deprecated = method.deprecated;
            methods.push(decl);
        }
        Ok(SurfaceDecl {
            name: self.name,
            kind: self.kind,
            supers: self.extends,
            methods,
        })
    }
}

/// Build a descriptor from source-style type names; the return type defaults to void.
fn source_descriptor(
    params: Option<&[String]>,
    returns: Option<&str>,
) -> Result<String, descriptor::DescriptorError> {
    let params = params
        .unwrap_or_default()
        .iter()
        .map(|p| JavaType::parse_source_name(p))
        .collect::<Result<Vec<_>, _>>()?;
    let return_type = match returns {
        Some(name) => JavaType::parse_source_name(name)?,
        None => JavaType::Void,
    };
    Ok(descriptor::encode(&return_type, &params))
}

// ---- Tracked surfaces ----

/// A surface narrowed to the methods the engine tracks.
#[derive(Debug, Clone)]
pub struct TargetSurface {
    pub name: String,
    pub kind: SurfaceKind,
    pub supers: Vec<String>,
    pub methods: BTreeSet<MethodTuple>,
    /// Whether the declaration had any methods before exclusion. Member-less
    /// annotations are tracked through [`MethodTuple::usage_marker`].
    pub has_members: bool,
}

impl TargetSurface {
    pub fn is_annotation(&self) -> bool {
        self.kind == SurfaceKind::Annotation
    }
}

#[derive(Debug, Default)]
pub struct TrackedSurfaces {
    surfaces: BTreeMap<String, TargetSurface>,
}

impl TrackedSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, surface: TargetSurface) {
        self.surfaces.insert(surface.name.clone(), surface);
    }

    pub fn get(&self, name: &str) -> Option<&TargetSurface> {
        self.surfaces.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetSurface> {
        self.surfaces.values()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn annotations(&self) -> impl Iterator<Item = &TargetSurface> {
        self.surfaces.values().filter(|s| s.is_annotation())
    }

    pub fn has_annotations(&self) -> bool {
        self.annotations().next().is_some()
    }

    /// Find the tracked surface that declares `name descriptor`, starting at
    /// `owner` and walking declared super types depth-first. Super types are
    /// only followed through surfaces that are themselves tracked.
    pub fn lookup(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<(&TargetSurface, &MethodTuple)> {
        let wanted = MethodTuple::new(name, descriptor);
        let mut visited = HashSet::new();
        let mut stack = vec![owner];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(surface) = self.surfaces.get(current) else {
                continue;
            };
            if let Some(tuple) = surface.methods.get(&wanted) {
                return Some((surface, tuple));
            }
            stack.extend(surface.supers.iter().rev().map(String::as_str));
        }
        None
    }

    /// An empty report with one entry per tracked method.
    pub fn seed_report(&self) -> CoverageReport {
        let mut report = CoverageReport::new();
        for surface in self.surfaces.values() {
            report.seed_surface(&surface.name);
            for tuple in &surface.methods {
                report.seed(&surface.name, tuple.clone());
            }
        }
        report
    }
}
