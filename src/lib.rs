// Library exports for the binary and integration tests

pub mod config;
pub mod counters;
pub mod error;
pub mod file_watcher;
pub mod logging;
pub mod notifier;
pub mod rescan;
pub mod shutdown;
pub mod upload_queue;
