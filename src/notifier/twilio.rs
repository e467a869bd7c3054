//! SMS delivery through the Twilio REST API.

use super::MessageSender;
use crate::config::NotifierConfig;
use crate::error::{Result, UploaderError};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: String,
}

#[derive(Clone)]
pub struct TwilioSender {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl std::fmt::Debug for TwilioSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioSender")
            .field("config", &self.config)
            .finish()
    }
}

impl TwilioSender {
    pub fn new(config: NotifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(UploaderError::Http)?;
        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

impl MessageSender for TwilioSender {
    async fn send_message(&self, body: &str) -> Result<String> {
        let (Some(to), Some(from)) = (&self.config.to, &self.config.from) else {
            return Err(UploaderError::Notification(
                "recipient or sender number is not configured".to_string(),
            ));
        };

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploaderError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let created: MessageCreated = response.json().await?;
        Ok(created.sid)
    }
}
