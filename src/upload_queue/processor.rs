//! Upload worker: runs queued jobs strictly one at a time in submission order.
//!
//! Every job ends in exactly one outcome, which is recorded on the counters
//! and sent back on the job's completion channel before the next job starts.
//! Each upload runs in its own task so a timeout can abort it and a panic
//! cannot take the worker down with it.

use crate::counters::UploadCounters;
use crate::logging::{log_error, log_info, log_warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::queue_manager::{self, SharedQueueState};
use super::types::{FailureReason, UploadJob, UploadOutcome, QUEUE_CONCURRENCY};
use super::upload::{PhotoTransport, Uploader};

const COMPONENT: &str = "upload-queue";

pub struct UploadProcessor<T> {
    uploader: Arc<Uploader<T>>,
    state: SharedQueueState,
    counters: Arc<UploadCounters>,
    job_timeout: Duration,
    shutdown: CancellationToken,
}

impl<T: PhotoTransport> UploadProcessor<T> {
    pub fn new(
        uploader: Arc<Uploader<T>>,
        state: SharedQueueState,
        counters: Arc<UploadCounters>,
        job_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            uploader,
            state,
            counters,
            job_timeout,
            shutdown,
        }
    }

    /// Main processing loop. Returns when shutdown is requested or every sender is gone.
    pub async fn run(self, mut jobs: mpsc::UnboundedReceiver<UploadJob>) {
        log_info(
            COMPONENT,
            &format!(
                "Upload processor started (concurrency {}, job timeout {}s)",
                QUEUE_CONCURRENCY,
                self.job_timeout.as_secs()
            ),
        );

        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            // Runs to completion even if shutdown arrives meanwhile
            self.process_job(job).await;
        }

        self.abandon_remaining(&mut jobs);
        log_info(COMPONENT, "Upload processor stopped");
    }

    async fn process_job(&self, job: UploadJob) {
        let path = job.file.path.clone();
        queue_manager::lock(&self.state).begin(&path);

        log_info(
            COMPONENT,
            &format!("Uploading photo with filename \"{}\"", job.file.file_name()),
        );

        let outcome = self.run_upload(&job).await;

        self.counters.record(&outcome);
        queue_manager::lock(&self.state).finish(&path);

        // The submitter may have dropped its ticket; the outcome is already counted
        let _ = job.completion.send(outcome);
    }

    async fn run_upload(&self, job: &UploadJob) -> UploadOutcome {
        let uploader = Arc::clone(&self.uploader);
        let path = job.file.path.clone();
        let mut handle = tokio::spawn(async move { uploader.upload(&path).await });

        match tokio::time::timeout(self.job_timeout, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => {
                log_error(
                    COMPONENT,
                    &format!("Upload task for job {} failed: {}", job.id, join_error),
                );
                UploadOutcome::Failure(FailureReason::Panicked)
            }
            Err(_) => {
                handle.abort();
                // The task may have finished between the deadline and the abort
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        log_error(
                            COMPONENT,
                            &format!(
                                "Photo with filename \"{}\" failed to upload: no answer within {}s",
                                job.file.file_name(),
                                self.job_timeout.as_secs()
                            ),
                        );
                        UploadOutcome::Failure(FailureReason::TimedOut)
                    }
                }
            }
        }
    }

    fn abandon_remaining(&self, jobs: &mut mpsc::UnboundedReceiver<UploadJob>) {
        jobs.close();

        let mut abandoned = 0usize;
        while let Ok(job) = jobs.try_recv() {
            abandoned += 1;
            // Dropping the completion sender resolves the ticket with None
            drop(job);
        }
        queue_manager::lock(&self.state).abandon_pending();

        if abandoned > 0 {
            log_warn(
                COMPONENT,
                &format!(
                    "Shutting down with {} queued photo(s) not uploaded; they remain on disk",
                    abandoned
                ),
            );
        }
    }
}
