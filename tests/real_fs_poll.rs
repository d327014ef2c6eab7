// tests/real_fs_poll.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use etagwatch::engine::{WatchEvent, WatchOptions, Watcher};
use etagwatch::types::BackendKind;
use etagwatch_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// Wait for the first event matching `pred`, skipping others.
async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<WatchEvent>, pred: F) -> Option<WatchEvent>
where
    F: Fn(&WatchEvent) -> bool,
{
    timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

#[tokio::test]
async fn poll_backend_reports_real_changes() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.txt"), b"0123456789")?;
    fs::write(dir.path().join("b.txt"), b"01234")?;

    let options = WatchOptions::new(dir.path())
        .backend(BackendKind::Poll)
        .poll_interval(Duration::from_millis(50))
        .dependency("a.txt", ["b.txt"]);
    let (watcher, mut events) = Watcher::start(options).await?;
    let root = watcher.root().to_path_buf();

    assert_eq!(events.recv().await, Some(WatchEvent::Initialized));

    fs::write(root.join("b.txt"), b"01234567")?;
    let a = root.join("a.txt");
    let event = wait_for(&mut events, |e| {
        matches!(e, WatchEvent::Changed { path, .. } if *path == a)
    })
    .await;
    match event {
        Some(WatchEvent::Changed { etag, .. }) => assert!(etag.as_str().starts_with("\"18-")),
        other => panic!("expected a.txt to change, got {other:?}"),
    }

    fs::write(root.join("c.txt"), b"new")?;
    let c = root.join("c.txt");
    let added = wait_for(&mut events, |e| {
        matches!(e, WatchEvent::Added { path } if *path == c)
    })
    .await;
    assert!(added.is_some(), "c.txt was never added");

    watcher.shutdown().await?;
    Ok(())
}
