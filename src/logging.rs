use crate::error::{ErrorContext, Result};
use std::path::Path;
use std::sync::{LazyLock, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const LOG_FILE_NAME: &str = "uploader.log";

static LOGGER_INITIALIZED: std::sync::Once = std::sync::Once::new();

// Keep the guard alive for the lifetime of the program
static FILE_APPENDER_GUARD: LazyLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    LazyLock::new(|| Mutex::new(None));

/// Install the global subscriber.
///
/// Console output is always on. A plain-text file copy is written only when
/// `log_dir` is given; the booth does not need one to operate.
pub fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)
            .context(&format!("Failed to create log dir {}", dir.display()))?;
    }

    LOGGER_INITIALIZED.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_filter(env_filter.clone());

        let file_layer = log_dir.map(|dir| {
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
                *guard_mutex = Some(guard);
            }

            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter.clone())
        });

        // try_init so a subscriber installed by a test harness does not abort us
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init();
    });

    Ok(())
}

pub fn log_component_event(component: &str, level: tracing::Level, message: &str) {
    match level {
        tracing::Level::ERROR => error!(component = component, "{}", message),
        tracing::Level::WARN => warn!(component = component, "{}", message),
        tracing::Level::DEBUG | tracing::Level::TRACE => {
            debug!(component = component, "{}", message)
        }
        _ => info!(component = component, "{}", message),
    }
}

// Convenience functions for different log levels
pub fn log_debug(component: &str, message: &str) {
    log_component_event(component, tracing::Level::DEBUG, message)
}

pub fn log_info(component: &str, message: &str) {
    log_component_event(component, tracing::Level::INFO, message)
}

pub fn log_warn(component: &str, message: &str) {
    log_component_event(component, tracing::Level::WARN, message)
}

pub fn log_error(component: &str, message: &str) {
    log_component_event(component, tracing::Level::ERROR, message)
}
