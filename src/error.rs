use thiserror::Error;

/// Result alias used across the uploader.
pub type Result<T> = std::result::Result<T, UploaderError>;

/// Emotobooth uploader errors
#[derive(Debug, Error)]
pub enum UploaderError {
    /// Configuration file or environment errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upload errors that are not plain transport failures
    #[error("Upload error: {0}")]
    Upload(String),

    /// Remote endpoint answered with a non-2xx status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Status message delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// The upload queue worker is no longer accepting jobs
    #[error("Upload queue is closed")]
    QueueClosed,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File system watcher errors
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<UploaderError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            UploaderError::Other(s) => UploaderError::Other(format!("{}: {}", msg, s)),
            UploaderError::Config(s) => UploaderError::Config(format!("{}: {}", msg, s)),
            UploaderError::Upload(s) => UploaderError::Upload(format!("{}: {}", msg, s)),
            UploaderError::Notification(s) => {
                UploaderError::Notification(format!("{}: {}", msg, s))
            }
            // Typed sources keep their structure; the message is carried by Other instead
            UploaderError::Io(e) => UploaderError::Other(format!("{}: I/O error: {}", msg, e)),
            other => other,
        })
    }
}
