// src/watch/fingerprint.rs

//! Etag computation.
//!
//! An etag is `"<size>-<modtime>"` (quotes included) where both numbers are
//! sums over the entry's own snapshot and the last known snapshot of every
//! declared dependency. Summation means distinct states can collide; callers
//! must treat the token as opaque.

use std::fmt;
use std::path::Path;

use tracing::trace;

use crate::registry::PathRegistry;
use crate::types::Snapshot;

/// Opaque fingerprint token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Etag(String);

impl Etag {
    pub fn from_totals(total_size: u128, total_modified_ms: u128) -> Self {
        Etag(format!("\"{total_size}-{total_modified_ms}\""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fold a set of snapshots into an etag.
pub fn etag_for<'a, I>(snapshots: I) -> Etag
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    let (size, modified) = snapshots.into_iter().fold((0u128, 0u128), |(s, m), snap| {
        (s + u128::from(snap.size), m + u128::from(snap.modified_ms))
    });
    Etag::from_totals(size, modified)
}

/// Compute the etag of `path` from the registry without storing it.
///
/// Returns `None` when the path is not tracked or has never been stat'ed.
/// Dependencies that are not tracked (or have no snapshot) contribute nothing.
pub fn compute_etag(registry: &PathRegistry, path: &Path) -> Option<Etag> {
    let entry = registry.get(path)?;
    let own = entry.snapshot.as_ref()?;

    let deps = entry
        .dependencies
        .iter()
        .filter_map(|dep| registry.get(dep).and_then(|d| d.snapshot.as_ref()));

    Some(etag_for(std::iter::once(own).chain(deps)))
}

/// Compute the etag of `path` and store it back into its entry.
pub fn refresh_etag(registry: &mut PathRegistry, path: &Path) -> Option<Etag> {
    let etag = compute_etag(registry, path)?;
    if let Some(entry) = registry.get_mut(path) {
        trace!(?path, %etag, "refreshed etag");
        entry.etag = Some(etag.clone());
    }
    Some(etag)
}
