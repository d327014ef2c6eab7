// src/watch/expand.rs

//! Dependency fan-out.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::registry::PathRegistry;

/// Expand `changed` with every tracked path that directly depends on one of
/// its members.
///
/// The inputs come first, in their original order, followed by dependents in
/// registry order; duplicates are dropped. Only one hop is followed: if A
/// depends on B and B on C, a change to C yields `[C, B]`.
pub fn expand_dependents(registry: &PathRegistry, changed: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut out = Vec::with_capacity(changed.len());

    for path in changed {
        if seen.insert(path.clone()) {
            out.push(path.clone());
        }
    }

    let changed_set: HashSet<&PathBuf> = changed.iter().collect();
    for entry in registry.entries() {
        if !entry.has_dependencies() {
            continue;
        }
        if entry.dependencies.iter().any(|d| changed_set.contains(d)) && seen.insert(entry.path.clone())
        {
            out.push(entry.path.clone());
        }
    }

    out
}
