#![allow(dead_code)]

use etagwatch::config::{ConfigFile, DependencyList, RawConfigFile};
use etagwatch::errors::Result;
use etagwatch::types::BackendKind;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.config.watch.root = root.into();
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.config.watch.backend = backend;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.watch.poll_interval_ms = ms;
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn with_dependency(mut self, path: &str, deps: &[&str]) -> Self {
        self.config.dependencies.insert(
            path.to_string(),
            DependencyList::Many(deps.iter().map(|d| d.to_string()).collect()),
        );
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
