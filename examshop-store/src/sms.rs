use async_trait::async_trait;
use examshop_core::{Notifier, NotifyError};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::app_config::SmsConfig;

/// Sends text messages through an HTTP SMS relay authenticated with an
/// `x-api-key` header.
#[derive(Debug, Clone)]
pub struct HttpSmsNotifier {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    sender: String,
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    content: &'a str,
    to: &'a str,
    from: &'a str,
}

impl HttpSmsNotifier {
    pub fn new(config: &SmsConfig) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpSmsNotifier {
    async fn notify(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let api_key = self.api_key.as_deref().ok_or(NotifyError::NotConfigured)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .json(&SendBody {
                content: message,
                to: destination,
                from: &self.sender,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("SMS relay answered {}: {}", status, text);
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        tracing::debug!("SMS accepted for {}", examshop_shared::Masked(destination.to_string()).hint());
        Ok(())
    }
}
