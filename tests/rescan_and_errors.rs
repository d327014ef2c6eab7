// tests/rescan_and_errors.rs

use std::error::Error;
use std::path::{Path, PathBuf};

use etagwatch::engine::{WatchEvent, WatchOptions};
use etagwatch::errors::WatchError;
use etagwatch::fs::mock::MockFileSystem;
use etagwatch::watch::Etag;
use etagwatch_test_utils::fake_backend::FakeBackend;
use etagwatch_test_utils::harness::Harness;
use etagwatch_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

fn siblings() -> MockFileSystem {
    let fs = MockFileSystem::new("/r");
    fs.add_file("/r/a", 1, 10);
    fs.add_file("/r/b", 2, 20);
    fs.add_file("/r/c", 3, 30);
    fs.add_file("/r/sub/s", 4, 40);
    fs
}

#[tokio::test]
async fn directory_notification_reports_only_the_new_file() -> TestResult {
    init_tracing();
    let mut h = Harness::start(siblings(), WatchOptions::new("/r")).await?;

    h.fs.add_file("/r/d", 5, 50);
    h.notify("/r");

    assert_eq!(
        h.settle().await,
        vec![
            WatchEvent::Added { path: p("/r/d") },
            WatchEvent::Changed { path: p("/r/d"), etag: Etag::from_totals(5, 50) },
        ]
    );

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn directory_rescan_picks_up_modified_and_removed_children() -> TestResult {
    init_tracing();
    let mut h = Harness::start(siblings(), WatchOptions::new("/r")).await?;

    h.fs.set_file("/r/a", 9, 10);
    h.fs.remove("/r/b");
    h.rescan(Some(p("/r")));
    let events = h.settle().await;

    assert_eq!(events.len(), 2, "{events:?}");
    assert!(events.contains(&WatchEvent::Deleted { path: p("/r/b") }));
    assert!(events.contains(&WatchEvent::Changed {
        path: p("/r/a"),
        etag: Etag::from_totals(9, 10),
    }));
    assert!(!h.backend.is_watching("/r/b"));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn full_rescan_covers_every_directory() -> TestResult {
    init_tracing();
    let mut h = Harness::start(siblings(), WatchOptions::new("/r")).await?;

    h.fs.add_file("/r/sub/t", 6, 60);
    h.fs.set_file("/r/c", 3, 31);
    h.rescan(None);
    let events = h.settle().await;

    assert_eq!(events.len(), 3, "{events:?}");
    assert!(events.contains(&WatchEvent::Added { path: p("/r/sub/t") }));
    assert!(events.contains(&WatchEvent::Changed {
        path: p("/r/sub/t"),
        etag: Etag::from_totals(6, 60),
    }));
    assert!(events.contains(&WatchEvent::Changed {
        path: p("/r/c"),
        etag: Etag::from_totals(3, 31),
    }));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_rescan_is_reported_and_the_rest_keeps_working() -> TestResult {
    init_tracing();
    let mut h = Harness::start(siblings(), WatchOptions::new("/r")).await?;

    h.fs.fail("/r/sub");
    h.notify("/r/sub");
    let events = h.settle().await;
    assert!(
        matches!(&events[..], [WatchEvent::Error { path, .. }] if path == Path::new("/r/sub")),
        "{events:?}"
    );
    assert!(h.backend.is_watching("/r/sub/s"));

    h.fs.set_file("/r/a", 1, 11);
    h.notify("/r/a");
    assert_eq!(
        h.settle().await,
        vec![WatchEvent::Changed { path: p("/r/a"), etag: Etag::from_totals(1, 11) }]
    );

    // Once healed, the directory rescans normally again.
    h.fs.heal("/r/sub");
    h.fs.add_file("/r/sub/u", 1, 1);
    h.notify("/r/sub");
    assert!(h.settle().await.contains(&WatchEvent::Added { path: p("/r/sub/u") }));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stat_failure_on_a_file_is_an_error_event() -> TestResult {
    init_tracing();
    let mut h = Harness::start(siblings(), WatchOptions::new("/r")).await?;

    h.fs.fail("/r/a");
    h.notify("/r/a");
    let events = h.settle().await;
    assert!(matches!(&events[..], [WatchEvent::Error { path, .. }] if path == Path::new("/r/a")));
    assert!(h.backend.is_watching("/r/a"));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn missing_root_fails_start() {
    init_tracing();
    let fs = MockFileSystem::new("/elsewhere");

    let err = Harness::start(fs, WatchOptions::new("/r")).await.err().unwrap();
    assert!(matches!(err, WatchError::Traversal { ref path, .. } if path == Path::new("/r")));
}

#[tokio::test]
async fn root_that_is_a_file_fails_start() {
    init_tracing();
    let fs = MockFileSystem::new("/");
    fs.add_file("/r", 1, 1);

    let err = Harness::start(fs, WatchOptions::new("/r")).await.err().unwrap();
    assert!(matches!(err, WatchError::Traversal { .. }));
}

#[tokio::test]
async fn traversal_failure_during_start_is_fatal_and_releases_handles() {
    init_tracing();
    let fs = siblings();
    fs.fail("/r/sub");
    let backend = FakeBackend::new();

    let err = Harness::start_with_backend(fs, backend.clone(), WatchOptions::new("/r"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, WatchError::Traversal { ref path, .. } if path == Path::new("/r/sub")));
    assert!(backend.active_paths().is_empty());
    assert!(backend.misuse().is_empty());
}

#[tokio::test]
async fn refused_watch_during_start_is_fatal() {
    init_tracing();
    let backend = FakeBackend::new();
    backend.refuse("/r/sub/s");

    let err = Harness::start_with_backend(siblings(), backend.clone(), WatchOptions::new("/r"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, WatchError::WatchSetup { ref path, .. } if path == Path::new("/r/sub/s")));
    assert!(backend.active_paths().is_empty());
}

#[tokio::test]
async fn refused_watch_after_start_is_an_error_event() -> TestResult {
    init_tracing();
    let mut h = Harness::start(siblings(), WatchOptions::new("/r")).await?;

    h.backend.refuse("/r/new");
    h.fs.add_file("/r/new", 1, 1);
    h.notify("/r/new");
    let events = h.settle().await;
    assert!(matches!(&events[..], [WatchEvent::Error { path, .. }] if path == Path::new("/r/new")));
    assert!(!h.backend.is_watching("/r/new"));

    h.backend.allow("/r/new");
    h.notify("/r/new");
    assert_eq!(
        h.settle().await,
        vec![
            WatchEvent::Added { path: p("/r/new") },
            WatchEvent::Changed { path: p("/r/new"), etag: Etag::from_totals(1, 1) },
        ]
    );

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn notifications_outside_the_root_are_ignored() -> TestResult {
    init_tracing();
    let fs = siblings();
    fs.add_file("/other/x", 1, 1);
    let mut h = Harness::start(fs, WatchOptions::new("/r")).await?;

    h.notify("/other/x");
    assert!(h.settle().await.is_empty());
    assert!(!h.backend.is_watching("/other/x"));

    h.shutdown().await?;
    Ok(())
}
