//! Optional periodic sweep of the incoming folder.
//!
//! Picks up files whose filesystem event was missed and files left behind by
//! a failed upload. Paths already pending or in flight are skipped by the
//! queue itself.

use crate::file_watcher::{scan_directory, WatchOptions};
use crate::logging::{log_debug, log_info, log_warn};
use crate::upload_queue::{EnqueueResult, UploadQueue, WatchedFile};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const COMPONENT: &str = "rescan";

pub fn spawn_rescan(
    options: WatchOptions,
    queue: UploadQueue,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log_info(
            COMPONENT,
            &format!("Rescanning {} every {}s", options.root.display(), period.as_secs()),
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !rescan_once(&options, &queue).await {
                        break;
                    }
                }
            }
        }
    })
}

/// One sweep. Returns false once the queue no longer accepts jobs.
async fn rescan_once(options: &WatchOptions, queue: &UploadQueue) -> bool {
    let scan_options = options.clone();
    let found = match tokio::task::spawn_blocking(move || scan_directory(&scan_options)).await {
        Ok(found) => found,
        Err(e) => {
            log_warn(COMPONENT, &format!("Rescan task failed: {}", e));
            return true;
        }
    };

    let mut queued = 0usize;
    for path in found {
        match queue.enqueue(WatchedFile::new(path)) {
            Ok(EnqueueResult::Queued(_)) => queued += 1,
            Ok(EnqueueResult::AlreadyQueued) => {}
            Err(_) => return false,
        }
    }

    if queued > 0 {
        log_info(COMPONENT, &format!("Rescan queued {} photo(s)", queued));
    } else {
        log_debug(COMPONENT, "Rescan found nothing new");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::UploadCounters;
    use crate::error::Result;
    use crate::upload_queue::{
        PhotoTransport, QueueOptions, TransportResponse, Uploader, SUCCESS_SENTINEL,
    };
    use std::path::Path;
    use std::sync::Arc;

    struct AcceptAll;

    impl PhotoTransport for AcceptAll {
        async fn send(&self, _file_path: &Path) -> Result<TransportResponse> {
            Ok(TransportResponse::ok(SUCCESS_SENTINEL))
        }
    }

    #[tokio::test]
    async fn test_rescan_uploads_files_without_events() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let counters = Arc::new(UploadCounters::new());
        let shutdown = CancellationToken::new();
        let (queue, _worker) = UploadQueue::spawn(
            Arc::new(Uploader::new(AcceptAll)),
            Arc::clone(&counters),
            QueueOptions::default(),
            shutdown.clone(),
        );

        // Written before the sweep starts and never announced by a watcher
        std::fs::write(root.join("missed.jpg"), b"bytes").unwrap();

        let handle = spawn_rescan(
            WatchOptions::new(&root),
            queue,
            Duration::from_millis(20),
            shutdown.clone(),
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while counters.snapshot().succeeded < 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(counters.snapshot().succeeded, 1);
        assert!(!root.join("missed.jpg").exists());
    }
}
