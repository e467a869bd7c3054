//! Periodic status reports with the success and failure totals.
//!
//! The first report goes out one full interval after start. A failed send is
//! logged and the next tick is attempted as usual.

pub mod twilio;

pub use twilio::TwilioSender;

use crate::counters::{CounterSnapshot, UploadCounters};
use crate::error::Result;
use crate::logging::{log_error, log_info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const COMPONENT: &str = "notifier";

/// Delivers a text message, returning the provider's message id.
pub trait MessageSender: Send + Sync + 'static {
    fn send_message(&self, body: &str) -> impl Future<Output = Result<String>> + Send;
}

pub fn format_status_message(snapshot: CounterSnapshot) -> String {
    format!(
        "Emotobooth Status Update: \r\nSuccess: {} \r\nFailed: {}",
        snapshot.succeeded, snapshot.failed
    )
}

pub struct StatusNotifier;

impl StatusNotifier {
    pub fn spawn<S: MessageSender>(
        sender: S,
        counters: Arc<UploadCounters>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            log_info(
                COMPONENT,
                &format!("Status reports every {}s", period.as_secs()),
            );

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => send_status(&sender, &counters).await,
                }
            }

            log_info(COMPONENT, "Status reports stopped");
        })
    }
}

async fn send_status<S: MessageSender>(sender: &S, counters: &UploadCounters) {
    let body = format_status_message(counters.snapshot());
    match sender.send_message(&body).await {
        Ok(sid) => log_info(COMPONENT, &format!("Sent status message with {}", sid)),
        Err(e) => log_error(COMPONENT, &format!("Unable to send status message! {}", e)),
    }
}
