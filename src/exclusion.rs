//! Which surface methods are tracked at all.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::classfile::MethodDecl;
use crate::diagnostics::CoverageError;

/// `java.lang.Object` overrides that say nothing about API usage.
const OBJECT_METHODS: [(&str, &str); 3] = [
    ("equals", "(Ljava/lang/Object;)Z"),
    ("hashCode", "()I"),
    ("toString", "()Ljava/lang/String;"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExclusionReason {
    NotPublic,
    Deprecated,
    ObjectMethod,
    Listed,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExclusionReason::NotPublic => "not public",
            ExclusionReason::Deprecated => "deprecated",
            ExclusionReason::ObjectMethod => "java.lang.Object method",
            ExclusionReason::Listed => "listed in exclusions file",
        })
    }
}

pub trait MethodExclusion {
    /// Why `method` of `declaring_type` is not tracked, or `None` to track it.
    fn exclusion_reason(&self, declaring_type: &str, method: &MethodDecl)
    -> Option<ExclusionReason>;

    fn is_excluded(&self, declaring_type: &str, method: &MethodDecl) -> bool {
        self.exclusion_reason(declaring_type, method).is_some()
    }
}

/// Excludes non-public and deprecated methods, and optionally the
/// `equals`/`hashCode`/`toString` overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseExclusion {
    object_methods: bool,
}

impl BaseExclusion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_methods() -> Self {
        Self {
            object_methods: true,
        }
    }
}

impl MethodExclusion for BaseExclusion {
    fn exclusion_reason(&self, _declaring_type: &str, method: &MethodDecl) -> Option<ExclusionReason> {
        if !method.access.is_public() {
            return Some(ExclusionReason::NotPublic);
        }
        if method.deprecated {
            return Some(ExclusionReason::Deprecated);
        }
        if self.object_methods
            && OBJECT_METHODS
                .iter()
                .any(|(name, desc)| method.name == *name && method.descriptor == *desc)
        {
            return Some(ExclusionReason::ObjectMethod);
        }
        None
    }
}

/// A base rule plus an explicit list of `type@name@descriptor` triples.
#[derive(Debug, Clone, Default)]
pub struct FileExclusion {
    base: BaseExclusion,
    listed: BTreeSet<String>,
}

impl FileExclusion {
    /// Parse an exclusions file: one triple per line, `#` comments and blank
    /// lines ignored.
    pub fn parse(base: BaseExclusion, text: &str) -> Self {
        let listed = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { base, listed }
    }

    pub fn load(base: BaseExclusion, path: &Path) -> Result<Self, CoverageError> {
        let text = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
        Ok(Self::parse(base, &text))
    }

    pub fn len(&self) -> usize {
        self.listed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listed.is_empty()
    }
}

impl MethodExclusion for FileExclusion {
    fn exclusion_reason(&self, declaring_type: &str, method: &MethodDecl) -> Option<ExclusionReason> {
        self.base
            .exclusion_reason(declaring_type, method)
            .or_else(|| {
                let key = format!("{declaring_type}@{}@{}", method.name, method.descriptor);
                self.listed.contains(&key).then_some(ExclusionReason::Listed)
            })
    }
}
