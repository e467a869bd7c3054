//! Single-file upload: send, classify, clean up.
//!
//! The transport is a trait so the queue can be driven by the reqwest client
//! in production and by in-memory fakes in tests.

pub mod classify;
pub mod http;

pub use classify::{classify_error, classify_response, is_success_body};
pub use http::HttpTransport;

use crate::error::Result;
use crate::logging::{log_error, log_info, log_warn};
use crate::upload_queue::types::{display_name, UploadOutcome};
use std::future::Future;
use std::path::Path;

const COMPONENT: &str = "upload-queue";

/// Raw answer from the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Delivers one file to the remote endpoint.
///
/// `Err` is reserved for transport failures; any HTTP answer, including
/// error statuses, comes back as a `TransportResponse`.
pub trait PhotoTransport: Send + Sync + 'static {
    fn send(&self, file_path: &Path) -> impl Future<Output = Result<TransportResponse>> + Send;
}

/// Uploads a file and classifies the result.
///
/// On confirmed success the local file is deleted before `upload` returns.
/// Nothing here returns an error: every path ends in an `UploadOutcome`.
#[derive(Debug)]
pub struct Uploader<T> {
    transport: T,
}

impl<T: PhotoTransport> Uploader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn upload(&self, file_path: &Path) -> UploadOutcome {
        let file_name = display_name(file_path);

        let classified = match self.transport.send(file_path).await {
            Ok(response) => classify_response(&response),
            Err(e) => Err(classify_error(&e)),
        };

        match classified {
            Ok(()) => {
                log_info(
                    COMPONENT,
                    &format!("Photo with filename \"{}\" uploaded successfully", file_name),
                );
                UploadOutcome::Success {
                    removed: remove_uploaded_file(file_path),
                }
            }
            Err(reason) => {
                log_error(
                    COMPONENT,
                    &format!("Photo with filename \"{}\" failed to upload: {}", file_name, reason),
                );
                UploadOutcome::Failure(reason)
            }
        }
    }
}

/// Delete a confirmed upload. A failure here does not undo the confirmation.
fn remove_uploaded_file(file_path: &Path) -> bool {
    match std::fs::remove_file(file_path) {
        Ok(()) => true,
        Err(e) => {
            log_warn(
                COMPONENT,
                &format!(
                    "Uploaded {} but could not delete it: {}",
                    file_path.display(),
                    e
                ),
            );
            false
        }
    }
}
