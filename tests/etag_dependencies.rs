// tests/etag_dependencies.rs

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use etagwatch::engine::{WatchEvent, WatchOptions};
use etagwatch::errors::WatchError;
use etagwatch::fs::mock::MockFileSystem;
use etagwatch::watch::Etag;
use etagwatch_test_utils::harness::Harness;
use etagwatch_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn changed(path: &str, size: u128, mtime: u128) -> WatchEvent {
    WatchEvent::Changed {
        path: PathBuf::from(path),
        etag: Etag::from_totals(size, mtime),
    }
}

fn two_files() -> MockFileSystem {
    let fs = MockFileSystem::new("/r");
    fs.add_file("/r/a.txt", 10, 1_000);
    fs.add_file("/r/b.txt", 5, 2_000);
    fs
}

#[tokio::test]
async fn own_stat_drives_etag_without_dependencies() -> TestResult {
    init_tracing();
    let mut h = Harness::start(two_files(), WatchOptions::new("/r")).await?;

    h.fs.set_file("/r/a.txt", 10, 1_500);
    h.notify("/r/a.txt");
    assert_eq!(h.settle().await, vec![changed("/r/a.txt", 10, 1_500)]);

    h.fs.set_file("/r/a.txt", 11, 1_500);
    h.notify("/r/a.txt");
    assert_eq!(h.settle().await, vec![changed("/r/a.txt", 11, 1_500)]);

    // Same size and mtime: nothing to report.
    h.notify("/r/a.txt");
    assert!(h.settle().await.is_empty());

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn dependency_change_reaches_dependent_exactly_once() -> TestResult {
    init_tracing();
    let options = WatchOptions::new("/r").dependency("a.txt", ["b.txt"]);
    let mut h = Harness::start(two_files(), options).await?;

    h.fs.set_file("/r/b.txt", 8, 2_500);
    h.notify("/r/b.txt");
    let events = h.settle().await;

    assert_eq!(events.len(), 2, "{events:?}");
    assert!(events.contains(&changed("/r/b.txt", 8, 2_500)));
    assert!(events.contains(&changed("/r/a.txt", 18, 3_500)));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn declared_dependencies_fold_into_etag_immediately() -> TestResult {
    init_tracing();
    let mut h = Harness::start(two_files(), WatchOptions::new("/r")).await?;

    h.watcher.declare_dependencies("a.txt", ["b.txt"]).await?;
    assert_eq!(h.settle().await, vec![changed("/r/a.txt", 15, 3_000)]);

    // Replacing with an empty list restores the own-stat etag.
    h.watcher
        .declare_dependencies("/r/a.txt", Vec::<PathBuf>::new())
        .await?;
    assert_eq!(h.settle().await, vec![changed("/r/a.txt", 10, 1_000)]);

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn declare_on_unregistered_path_fails_without_side_effects() -> TestResult {
    init_tracing();
    let options = WatchOptions::new("/r").dependency("a.txt", ["b.txt"]);
    let mut h = Harness::start(two_files(), options).await?;

    let err = h
        .watcher
        .declare_dependencies("ghost.txt", ["a.txt"])
        .await
        .unwrap_err();
    assert!(matches!(err, WatchError::InvalidPath(ref p) if p == Path::new("/r/ghost.txt")));
    assert!(h.settle().await.is_empty());

    // Existing links are untouched.
    h.fs.set_file("/r/b.txt", 6, 2_000);
    h.notify("/r/b.txt");
    assert!(h.settle().await.contains(&changed("/r/a.txt", 16, 3_000)));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn self_and_cyclic_dependencies_are_rejected() -> TestResult {
    init_tracing();
    let options = WatchOptions::new("/r").dependency("a.txt", ["b.txt"]);
    let mut h = Harness::start(two_files(), options).await?;

    let err = h
        .watcher
        .declare_dependencies("a.txt", ["a.txt"])
        .await
        .unwrap_err();
    assert!(matches!(err, WatchError::SelfDependency(_)));

    let err = h
        .watcher
        .declare_dependencies("b.txt", ["a.txt"])
        .await
        .unwrap_err();
    assert!(matches!(err, WatchError::DependencyCycle(_)));

    assert!(h.settle().await.is_empty());
    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn deleted_dependency_drops_out_of_fan_out() -> TestResult {
    init_tracing();
    let options = WatchOptions::new("/r").dependency("a.txt", ["b.txt"]);
    let mut h = Harness::start(two_files(), options).await?;

    h.fs.remove("/r/b.txt");
    h.notify("/r/b.txt");
    let events = h.settle().await;
    assert!(events.contains(&WatchEvent::Deleted { path: PathBuf::from("/r/b.txt") }));
    assert!(events.contains(&changed("/r/a.txt", 10, 1_000)));
    assert_eq!(events.len(), 2, "{events:?}");

    // b is gone; touching a only reports a.
    h.fs.set_file("/r/a.txt", 10, 1_100);
    h.notify("/r/a.txt");
    assert_eq!(h.settle().await, vec![changed("/r/a.txt", 10, 1_100)]);

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn dependency_on_a_directory_tracks_its_mtime() -> TestResult {
    init_tracing();
    let fs = two_files();
    fs.add_dir("/r/d");
    let options = WatchOptions::new("/r").dependency("a.txt", ["d"]);
    let mut h = Harness::start(fs, options).await?;

    // Creating an entry bumps the directory's mtime, as a real fs does.
    h.fs.add_file("/r/d/new", 1, 700);
    h.fs.set_dir_mtime("/r/d", 500);
    h.notify("/r/d");
    let events = h.settle().await;

    assert_eq!(events.len(), 3, "{events:?}");
    assert!(events.contains(&WatchEvent::Added { path: PathBuf::from("/r/d/new") }));
    assert!(events.contains(&changed("/r/d/new", 1, 700)));
    assert!(events.contains(&changed("/r/a.txt", 10, 1_500)));
    assert!(!events.iter().any(|e| e.path() == Some(Path::new("/r/d"))));

    h.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn listener_sees_every_change() -> TestResult {
    init_tracing();
    let seen: Arc<Mutex<Vec<(PathBuf, String)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let options = WatchOptions::new("/r")
        .dependency("a.txt", ["b.txt"])
        .on_change(move |path, etag| {
            sink.lock()
                .unwrap()
                .push((path.to_path_buf(), etag.to_string()));
        });
    let mut h = Harness::start(two_files(), options).await?;

    h.fs.set_file("/r/b.txt", 8, 2_500);
    h.notify("/r/b.txt");
    h.settle().await;

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (PathBuf::from("/r/a.txt"), "\"18-3500\"".to_string()),
            (PathBuf::from("/r/b.txt"), "\"8-2500\"".to_string()),
        ]
    );

    h.shutdown().await?;
    Ok(())
}
