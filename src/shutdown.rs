use tokio_util::sync::CancellationToken;

/// Coordinates graceful shutdown across the watcher, queue worker, rescan and notifier tasks
///
/// Usage:
/// ```no_run
/// use emotobooth_uploader::shutdown::ShutdownCoordinator;
/// use tokio::sync::mpsc;
///
/// # async fn example() {
/// let coordinator = ShutdownCoordinator::new();
///
/// // In long-running tasks:
/// let token = coordinator.token();
/// let (_tx, mut event_rx) = mpsc::channel::<String>(10);
/// loop {
///     tokio::select! {
///         _ = token.cancelled() => break,
///         event = event_rx.recv() => { /* handle event */ }
///     }
/// }
///
/// // To trigger shutdown:
/// coordinator.shutdown();
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Child token for a task; cancelling the coordinator cancels every child
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Wait for Ctrl-C (or an explicit `shutdown()`), then cancel every task.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
            }
            _ = self.token.cancelled() => {}
        }
        self.shutdown();
    }
}
