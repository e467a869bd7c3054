use anyhow::Context;
use emotobooth_uploader::config::{load_config, NotifierConfig};
use emotobooth_uploader::counters::UploadCounters;
use emotobooth_uploader::file_watcher::{DirectoryWatcher, WatchOptions};
use emotobooth_uploader::logging::{init_logging, log_error, log_info, log_warn};
use emotobooth_uploader::notifier::{StatusNotifier, TwilioSender};
use emotobooth_uploader::rescan::spawn_rescan;
use emotobooth_uploader::shutdown::ShutdownCoordinator;
use emotobooth_uploader::upload_queue::{
    HttpTransport, QueueOptions, UploadQueue, Uploader, WatchedFile,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMPONENT: &str = "main";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("Failed to load uploader configuration")?;

    if let Err(e) = init_logging(config.log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let watch_dir = config
        .resolve_watch_dir()
        .context("Failed to prepare the watch directory")?;

    let coordinator = ShutdownCoordinator::new();
    let counters = Arc::new(UploadCounters::new());

    let transport = HttpTransport::from_config(&config).context("Failed to build HTTP client")?;
    let (queue, queue_worker) = UploadQueue::spawn(
        Arc::new(Uploader::new(transport)),
        Arc::clone(&counters),
        QueueOptions {
            job_timeout: config.upload_timeout(),
        },
        coordinator.token(),
    );
    log_info(
        COMPONENT,
        &format!("Uploading to {} as {}", config.endpoint, config.username),
    );

    let watch_options = WatchOptions::from_config(&config, watch_dir);
    let (watcher, discoveries) = DirectoryWatcher::start(watch_options.clone())
        .context("Failed to start watching the photo directory")?;
    let forwarder = spawn_forwarder(discoveries, queue.clone(), coordinator.token());

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if let Some(period) = config.rescan_interval() {
        tasks.push(spawn_rescan(
            watch_options,
            queue.clone(),
            period,
            coordinator.token(),
        ));
    }

    match NotifierConfig::from_env() {
        Some(notifier_config) => {
            let period = notifier_config.interval;
            match TwilioSender::new(notifier_config) {
                Ok(sender) => tasks.push(StatusNotifier::spawn(
                    sender,
                    Arc::clone(&counters),
                    period,
                    coordinator.token(),
                )),
                Err(e) => log_error(COMPONENT, &format!("Status reports disabled: {}", e)),
            }
        }
        None => log_info(COMPONENT, "Messaging credentials not set, status reports disabled"),
    }

    coordinator.wait_for_signal().await;
    log_info(COMPONENT, "Shutting down");

    watcher.stop();
    for handle in std::iter::once(forwarder)
        .chain(tasks)
        .chain(std::iter::once(queue_worker))
    {
        if let Err(e) = handle.await {
            log_warn(COMPONENT, &format!("Task ended abnormally: {}", e));
        }
    }

    let totals = counters.snapshot();
    log_info(
        COMPONENT,
        &format!(
            "Stopped. Success: {} Failed: {}",
            totals.succeeded, totals.failed
        ),
    );
    Ok(())
}

/// Feed watcher discoveries into the queue until shutdown or the watcher ends
fn spawn_forwarder(
    mut discoveries: mpsc::UnboundedReceiver<WatchedFile>,
    queue: UploadQueue,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let file = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                file = discoveries.recv() => match file {
                    Some(file) => file,
                    None => break,
                },
            };

            if let Err(e) = queue.enqueue(file) {
                log_warn(COMPONENT, &format!("Stopped forwarding discoveries: {}", e));
                break;
            }
        }
    })
}
