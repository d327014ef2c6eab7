// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::watch::path_utils::relative_str;

/// Compiled `exclude` patterns.
///
/// Patterns are evaluated against the path relative to the watch root with
/// forward slashes, e.g. `"css/site.css"`. Excluded paths are never
/// traversed, registered or reported.
#[derive(Clone)]
pub struct PathFilter {
    root: PathBuf,
    patterns: Vec<String>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("root", &self.root)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PathFilter {
    /// A filter that excludes nothing.
    pub fn allow_all(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: Vec::new(),
            exclude_set: None,
        }
    }

    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let exclude_set = if patterns.is_empty() {
            None
        } else {
            Some(build_globset(patterns).context("building exclude globset")?)
        };
        Ok(Self {
            root: root.into(),
            patterns: patterns.to_vec(),
            exclude_set,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if `path` matches one of the exclude patterns.
    ///
    /// The root itself and paths outside the root are never excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Some(set) = &self.exclude_set else {
            return false;
        };
        match relative_str(&self.root, path) {
            Some(rel) if !rel.is_empty() => set.is_match(&rel),
            _ => false,
        }
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
