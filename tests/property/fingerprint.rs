// tests/property/fingerprint.rs

use proptest::prelude::*;

use etagwatch::types::Snapshot;
use etagwatch::watch::fingerprint::etag_for;

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (any::<u64>(), any::<u64>()).prop_map(|(size, mtime)| Snapshot::new(size, mtime))
}

proptest! {
    #[test]
    fn etag_is_deterministic(snaps in proptest::collection::vec(snapshot_strategy(), 1..8)) {
        prop_assert_eq!(etag_for(snaps.iter()), etag_for(snaps.iter()));
    }

    #[test]
    fn etag_ignores_dependency_order(snaps in proptest::collection::vec(snapshot_strategy(), 1..8)) {
        let mut reversed = snaps.clone();
        reversed.reverse();
        prop_assert_eq!(etag_for(snaps.iter()), etag_for(reversed.iter()));
    }

    #[test]
    fn changing_own_size_or_mtime_changes_etag(
        size in 0u64..u64::MAX,
        mtime in 0u64..u64::MAX,
        bump_size in any::<bool>(),
    ) {
        let before = Snapshot::new(size, mtime);
        let after = if bump_size {
            Snapshot::new(size + 1, mtime)
        } else {
            Snapshot::new(size, mtime + 1)
        };
        prop_assert_ne!(etag_for([&before]), etag_for([&after]));
    }

    #[test]
    fn dependency_change_changes_dependent_etag(
        own in snapshot_strategy(),
        dep_size in 0u64..u64::MAX,
        dep_mtime in any::<u64>(),
    ) {
        let dep_before = Snapshot::new(dep_size, dep_mtime);
        let dep_after = Snapshot::new(dep_size + 1, dep_mtime);
        prop_assert_ne!(
            etag_for([&own, &dep_before]),
            etag_for([&own, &dep_after])
        );
    }

    #[test]
    fn etag_encodes_totals(size in any::<u32>(), mtime in any::<u32>()) {
        let etag = etag_for([&Snapshot::new(size as u64, mtime as u64)]);
        prop_assert_eq!(etag.as_str(), format!("\"{size}-{mtime}\""));
    }
}
