// Module declarations
mod processor;
mod queue_manager;
mod types;
pub mod upload;

// Re-export types and constants from submodules
pub use types::*;
pub use upload::{HttpTransport, PhotoTransport, TransportResponse, Uploader};

use crate::counters::UploadCounters;
use crate::error::{Result, UploaderError};
use crate::logging::log_debug;
use chrono::Utc;
use processor::UploadProcessor;
use queue_manager::SharedQueueState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Upper bound for one job; past it the job is aborted and counted as failed
    pub job_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

/// Handle to the single global upload queue.
///
/// Cloning is cheap; every clone feeds the same worker. Jobs start as soon
/// as they are enqueued, one at a time, in submission order.
#[derive(Clone)]
pub struct UploadQueue {
    sender: mpsc::UnboundedSender<UploadJob>,
    state: SharedQueueState,
    counters: Arc<UploadCounters>,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("sender", &"<job channel>")
            .field("state", &self.state)
            .field("counters", &self.counters)
            .finish()
    }
}

impl UploadQueue {
    /// Start the worker and return a handle plus the worker's join handle.
    pub fn spawn<T: PhotoTransport>(
        uploader: Arc<Uploader<T>>,
        counters: Arc<UploadCounters>,
        options: QueueOptions,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = queue_manager::new_state();

        let processor = UploadProcessor::new(
            uploader,
            Arc::clone(&state),
            Arc::clone(&counters),
            options.job_timeout,
            shutdown,
        );
        let worker = tokio::spawn(processor.run(receiver));

        (
            Self {
                sender,
                state,
                counters,
            },
            worker,
        )
    }

    /// Submit a discovered file.
    ///
    /// A path that is already pending or in flight is not submitted again.
    pub fn enqueue(&self, file: WatchedFile) -> Result<EnqueueResult> {
        let mut state = queue_manager::lock(&self.state);

        if !state.reserve(&file.path) {
            log_debug(
                "upload-queue",
                &format!("Skipping {}: already queued", file.path.display()),
            );
            return Ok(EnqueueResult::AlreadyQueued);
        }

        let (completion, outcome_rx) = oneshot::channel();
        let job = UploadJob {
            id: Uuid::new_v4().to_string(),
            file,
            queued_at: Utc::now(),
            completion,
        };
        let ticket = JobTicket {
            id: job.id.clone(),
            path: job.file.path.clone(),
            outcome_rx,
        };

        // Sent while holding the lock so the pending set and channel order agree
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            state.release(&job.file.path);
            return Err(UploaderError::QueueClosed);
        }

        Ok(EnqueueResult::Queued(ticket))
    }

    pub fn is_queued(&self, path: &Path) -> bool {
        queue_manager::lock(&self.state).is_queued(path)
    }

    /// Paths waiting for the worker, oldest first
    pub fn pending_paths(&self) -> Vec<std::path::PathBuf> {
        queue_manager::lock(&self.state).pending_paths()
    }

    pub fn status(&self) -> QueueStatus {
        let state = queue_manager::lock(&self.state);
        QueueStatus {
            pending: state.pending_len(),
            in_flight: state.in_flight(),
            counters: self.counters.snapshot(),
        }
    }

    pub fn counters(&self) -> Arc<UploadCounters> {
        Arc::clone(&self.counters)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that answers from a script and records call order
    #[derive(Default)]
    struct ScriptedTransport {
        calls: Mutex<Vec<PathBuf>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
    }

    impl PhotoTransport for ScriptedTransport {
        async fn send(&self, file_path: &Path) -> Result<TransportResponse> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            self.calls.lock().unwrap().push(file_path.to_path_buf());

            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let name = file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with("fail") {
                Ok(TransportResponse::ok("nope"))
            } else if name.starts_with("hang") {
                std::future::pending::<()>().await;
                unreachable!()
            } else if name.starts_with("panic") {
                panic!("transport exploded")
            } else {
                Ok(TransportResponse::ok(SUCCESS_SENTINEL))
            }
        }
    }

    fn spawn_queue(
        transport: ScriptedTransport,
        job_timeout: Duration,
    ) -> (UploadQueue, Arc<Uploader<ScriptedTransport>>, CancellationToken) {
        let uploader = Arc::new(Uploader::new(transport));
        let shutdown = CancellationToken::new();
        let (queue, _worker) = UploadQueue::spawn(
            Arc::clone(&uploader),
            Arc::new(UploadCounters::new()),
            QueueOptions { job_timeout },
            shutdown.clone(),
        );
        (queue, uploader, shutdown)
    }

    fn ticket(result: EnqueueResult) -> JobTicket {
        match result {
            EnqueueResult::Queued(ticket) => ticket,
            EnqueueResult::AlreadyQueued => panic!("expected the job to be queued"),
        }
    }

    #[tokio::test]
    async fn test_jobs_run_in_order_without_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let (queue, uploader, _shutdown) = spawn_queue(transport, Duration::from_secs(5));

        let mut tickets = Vec::new();
        let mut expected = Vec::new();
        for i in 0..5 {
            let path = dir.path().join(format!("photo-{}.jpg", i));
            std::fs::write(&path, b"bytes").unwrap();
            expected.push(path.clone());
            tickets.push(ticket(queue.enqueue(WatchedFile::new(path)).unwrap()));
        }

        for ticket in tickets {
            assert!(ticket.outcome().await.unwrap().is_success());
        }

        assert_eq!(*uploader.transport().calls.lock().unwrap(), expected);
        assert_eq!(uploader.transport().max_active.load(Ordering::SeqCst), 1);
        assert_eq!(queue.status().counters.succeeded, 5);
    }

    #[tokio::test]
    async fn test_duplicate_path_is_not_queued_twice() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport {
            delay: Duration::from_millis(50),
            ..Default::default()
        };
        let (queue, _uploader, _shutdown) = spawn_queue(transport, Duration::from_secs(5));

        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"bytes").unwrap();

        let first = ticket(queue.enqueue(WatchedFile::new(&path)).unwrap());
        assert!(matches!(
            queue.enqueue(WatchedFile::new(&path)).unwrap(),
            EnqueueResult::AlreadyQueued
        ));
        assert!(queue.is_queued(&path));
        assert!(queue.pending_paths().len() <= 1);

        first.outcome().await.unwrap();
        assert!(!queue.is_queued(&path));
    }

    #[tokio::test]
    async fn test_timeout_forces_failure_and_queue_advances() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _uploader, _shutdown) =
            spawn_queue(ScriptedTransport::default(), Duration::from_millis(100));

        let stuck = dir.path().join("hang.jpg");
        let next = dir.path().join("next.jpg");
        std::fs::write(&stuck, b"stuck").unwrap();
        std::fs::write(&next, b"next").unwrap();

        let stuck_ticket = ticket(queue.enqueue(WatchedFile::new(&stuck)).unwrap());
        let next_ticket = ticket(queue.enqueue(WatchedFile::new(&next)).unwrap());

        assert_eq!(
            stuck_ticket.outcome().await,
            Some(UploadOutcome::Failure(FailureReason::TimedOut))
        );
        assert!(next_ticket.outcome().await.unwrap().is_success());

        assert!(stuck.exists());
        assert!(!next.exists());
        let counters = queue.status().counters;
        assert_eq!((counters.succeeded, counters.failed), (1, 1));
    }

    #[tokio::test]
    async fn test_panicking_upload_does_not_stall_queue() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _uploader, _shutdown) =
            spawn_queue(ScriptedTransport::default(), Duration::from_secs(5));

        let bad = dir.path().join("panic.jpg");
        let good = dir.path().join("good.jpg");
        std::fs::write(&bad, b"bad").unwrap();
        std::fs::write(&good, b"good").unwrap();

        let bad_ticket = ticket(queue.enqueue(WatchedFile::new(&bad)).unwrap());
        let good_ticket = ticket(queue.enqueue(WatchedFile::new(&good)).unwrap());

        assert_eq!(
            bad_ticket.outcome().await,
            Some(UploadOutcome::Failure(FailureReason::Panicked))
        );
        assert!(good_ticket.outcome().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_rejected() {
        let uploader = Arc::new(Uploader::new(ScriptedTransport::default()));
        let shutdown = CancellationToken::new();
        let (queue, worker) = UploadQueue::spawn(
            uploader,
            Arc::new(UploadCounters::new()),
            QueueOptions::default(),
            shutdown.clone(),
        );

        shutdown.cancel();
        worker.await.unwrap();

        assert!(queue.is_closed());
        assert!(matches!(
            queue.enqueue(WatchedFile::new("/in/late.jpg")),
            Err(UploaderError::QueueClosed)
        ));
        assert!(!queue.is_queued(Path::new("/in/late.jpg")));
    }
}
