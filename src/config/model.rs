// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::WatchOptions;
use crate::types::BackendKind;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// root = "public"
/// backend = "poll"
/// poll_interval_ms = 250
/// exclude = ["**/.git", "**/*.swp"]
///
/// [dependencies]
/// "css/site.css" = ["css/vars.css", "css/mixins.css"]
/// "index.html" = "css/site.css"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    /// Path -> paths whose snapshots fold into its etag. Paths are relative
    /// to the watch root.
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyList>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Directory to watch, relative to the config file's directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub backend: BackendKind,

    /// Only used by the `poll` backend.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Glob patterns (relative to the root) that are never watched.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            backend: BackendKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            exclude: Vec::new(),
        }
    }
}

/// A dependency value may be a single path or a list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencyList {
    One(String),
    Many(Vec<String>),
}

impl DependencyList {
    pub fn as_slice(&self) -> &[String] {
        match self {
            DependencyList::One(s) => std::slice::from_ref(s),
            DependencyList::Many(v) => v,
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// `Default`, so the dependency graph is known to be acyclic.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        watch: WatchSection,
        dependencies: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            watch,
            dependencies,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }

    /// Build watcher options, resolving a relative root against `base_dir`.
    pub fn watch_options(&self, base_dir: &Path) -> WatchOptions {
        let root = if self.watch.root.is_absolute() {
            self.watch.root.clone()
        } else {
            base_dir.join(&self.watch.root)
        };

        let mut options = WatchOptions::new(root)
            .backend(self.watch.backend)
            .poll_interval(self.poll_interval());
        for pattern in &self.watch.exclude {
            options = options.exclude(pattern.clone());
        }
        for (path, deps) in &self.dependencies {
            options = options.dependency(path.as_str(), deps.iter().map(String::as_str));
        }
        options
    }
}
