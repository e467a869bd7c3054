//! Multipart HTTP upload to the booth server.

use super::{PhotoTransport, TransportResponse};
use crate::config::UploaderConfig;
use crate::error::{ErrorContext, Result, UploaderError};
use crate::upload_queue::types::{display_name, PASSWORD_FIELD, PHOTO_FIELD, USERNAME_FIELD};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

/// Posts `username`, `password` and the photo bytes to a fixed endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        // The request timeout mirrors the job timeout so a stuck socket is torn down too
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UploaderError::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.username.clone(),
            config.password.clone(),
            config.upload_timeout(),
        )
    }

    async fn build_form(&self, file_path: &Path) -> Result<Form> {
        let bytes = tokio::fs::read(file_path)
            .await
            .context(&format!("Failed to read {}", file_path.display()))?;

        let part = Part::bytes(bytes).file_name(display_name(file_path));

        Ok(Form::new()
            .text(USERNAME_FIELD, self.username.clone())
            .text(PASSWORD_FIELD, self.password.clone())
            .part(PHOTO_FIELD, part))
    }
}

impl PhotoTransport for HttpTransport {
    async fn send(&self, file_path: &Path) -> Result<TransportResponse> {
        let form = self.build_form(file_path).await?;

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploaderError::Upload(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploaderError::Upload(format!("Failed to read response body: {}", e)))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
