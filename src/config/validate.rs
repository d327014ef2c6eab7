// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WatchError};
use crate::watch::patterns::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let dependencies = flatten_dependencies(&raw.dependencies);
        Ok(ConfigFile::new_unchecked(raw.watch, dependencies))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch_section(cfg)?;
    validate_self_dependencies(cfg)?;
    validate_acyclic(cfg)?;
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.poll_interval_ms == 0 {
        return Err(WatchError::ConfigError(
            "[watch].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    build_globset(&cfg.watch.exclude)
        .map_err(|err| WatchError::ConfigError(format!("[watch].exclude: {err:#}")))?;

    Ok(())
}

fn validate_self_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (path, deps) in cfg.dependencies.iter() {
        if deps.as_slice().iter().any(|d| d == path) {
            return Err(WatchError::SelfDependency(path.into()));
        }
    }
    Ok(())
}

fn validate_acyclic(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (path, deps) in cfg.dependencies.iter() {
        graph.add_node(path.as_str());
        for dep in deps.as_slice() {
            graph.add_edge(dep.as_str(), path.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(WatchError::DependencyCycle(format!(
            "cycle in [dependencies] involving '{}'",
            cycle.node_id()
        ))),
    }
}

/// Collapse single values into lists and drop duplicate entries.
fn flatten_dependencies(
    raw: &BTreeMap<String, crate::config::model::DependencyList>,
) -> BTreeMap<String, Vec<String>> {
    raw.iter()
        .map(|(path, deps)| {
            let mut list: Vec<String> = Vec::new();
            for dep in deps.as_slice() {
                if !list.contains(dep) {
                    list.push(dep.clone());
                }
            }
            (path.clone(), list)
        })
        .collect()
}
