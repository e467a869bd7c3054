//! Live filesystem watching against a scratch directory.

use emotobooth_uploader::file_watcher::{DirectoryWatcher, WatchOptions};
use emotobooth_uploader::upload_queue::WatchedFile;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

/// Collect every discovery that arrives within `window`
async fn drain(rx: &mut UnboundedReceiver<WatchedFile>, window: Duration) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    while let Ok(Some(file)) = timeout(window, rx.recv()).await {
        paths.push(file.path);
    }
    paths
}

#[tokio::test]
async fn test_created_files_are_reported_once() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let (_watcher, mut rx) = DirectoryWatcher::start(WatchOptions::new(&root)).unwrap();

    fs::write(root.join("a.jpg"), b"a").unwrap();
    fs::write(root.join(".DS_Store"), b"finder").unwrap();

    let seen = drain(&mut rx, Duration::from_millis(500)).await;

    assert_eq!(seen.iter().filter(|p| **p == root.join("a.jpg")).count(), 1);
    assert!(!seen.contains(&root.join(".DS_Store")));
}

#[tokio::test]
async fn test_depth_limit_applies_to_live_events() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("session/deeper")).unwrap();

    let (_watcher, mut rx) = DirectoryWatcher::start(WatchOptions::new(&root)).unwrap();

    fs::write(root.join("session/deeper/too-deep.jpg"), b"x").unwrap();
    fs::write(root.join("session/ok.jpg"), b"y").unwrap();

    let seen = drain(&mut rx, Duration::from_millis(500)).await;

    assert!(seen.contains(&root.join("session/ok.jpg")));
    assert!(!seen.contains(&root.join("session/deeper/too-deep.jpg")));
}

#[tokio::test]
async fn test_include_existing_controls_initial_scan() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("waiting.jpg"), b"w").unwrap();

    let (watcher, mut rx) =
        DirectoryWatcher::start(WatchOptions::new(&root).include_existing(false)).unwrap();
    assert!(drain(&mut rx, Duration::from_millis(200)).await.is_empty());
    watcher.stop();

    let (_watcher, mut rx) = DirectoryWatcher::start(WatchOptions::new(&root)).unwrap();
    let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.path, root.join("waiting.jpg"));
}

#[tokio::test]
async fn test_stop_ends_the_stream() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let (watcher, mut rx) = DirectoryWatcher::start(WatchOptions::new(&root)).unwrap();
    watcher.stop();

    let end = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_file_moved_up_into_root_is_reported_once() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("sub/deeper")).unwrap();
    fs::write(root.join("sub/deeper/x.jpg"), b"x").unwrap();

    let (_watcher, mut rx) =
        DirectoryWatcher::start(WatchOptions::new(&root).include_existing(false)).unwrap();

    fs::rename(root.join("sub/deeper/x.jpg"), root.join("b.jpg")).unwrap();

    let seen = drain(&mut rx, Duration::from_millis(800)).await;
    assert_eq!(seen, vec![root.join("b.jpg")]);
}

#[tokio::test]
async fn test_rename_within_watched_depth_reports_destination_once() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("sub")).unwrap();

    let (_watcher, mut rx) = DirectoryWatcher::start(
        WatchOptions::new(&root).with_write_settle(Duration::ZERO),
    )
    .unwrap();

    fs::write(root.join("sub/x.jpg"), b"x").unwrap();
    let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.path, root.join("sub/x.jpg"));

    fs::rename(root.join("sub/x.jpg"), root.join("b.jpg")).unwrap();

    let seen = drain(&mut rx, Duration::from_millis(800)).await;
    assert_eq!(seen.iter().filter(|p| **p == root.join("b.jpg")).count(), 1);
    assert!(!seen.contains(&root.join("sub/x.jpg")));
}

#[tokio::test]
async fn test_file_still_being_written_is_reported_after_it_settles() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let (_watcher, mut rx) = DirectoryWatcher::start(
        WatchOptions::new(&root).with_write_settle(Duration::from_millis(150)),
    )
    .unwrap();

    let photo = root.join("big.jpg");
    let writer_path = photo.clone();
    let writer = std::thread::spawn(move || {
        use std::io::Write;
        let mut file = fs::File::create(writer_path).unwrap();
        for _ in 0..5 {
            file.write_all(&[7u8; 4096]).unwrap();
            file.flush().unwrap();
            std::thread::sleep(Duration::from_millis(40));
        }
    });

    let found = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    let len_when_reported = fs::metadata(&found.path).unwrap().len();
    writer.join().unwrap();

    assert_eq!(found.path, photo);
    assert_eq!(len_when_reported, 5 * 4096);
}
