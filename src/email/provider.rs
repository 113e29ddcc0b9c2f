use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
    /// Falls back to the configured default sender.
    pub from: Option<String>,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Hand the message to the provider. Returns the provider's message id.
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, ProviderError>;
}

pub type DynEmailProvider = Arc<dyn EmailProvider>;

/// Resend HTTP API.
pub struct ResendProvider {
    config: EmailConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    reply_to: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    #[serde(default)]
    id: Option<String>,
}

impl ResendProvider {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration("Resend API key not configured".into()))?;

        let request = ResendRequest {
            from: email.from.as_deref().unwrap_or(&self.config.default_from),
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
            reply_to: email
                .reply_to
                .as_deref()
                .unwrap_or(&self.config.default_reply_to),
        };

        let url = format!("{}/emails", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to Resend: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "Resend API returned error status {}: {}",
                status, body
            )));
        }

        let parsed: ResendResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse Resend response: {}", e))
        })?;

        tracing::info!(to = %email.to, id = ?parsed.id, "Email sent via Resend");
        Ok(parsed.id)
    }
}

/// Mock email provider for testing. Keeps every message it was asked to send.
pub struct MockEmailProvider {
    fail: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            fail: false,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<Option<String>, ProviderError> {
        if self.fail {
            return Err(ProviderError::SendFailed(
                "Resend API returned error status 500".into(),
            ));
        }

        let n = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "[MOCK] Email would be sent"
        );
        Ok(Some(format!("mock-email-{}", n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "parent@example.com".into(),
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
            text: None,
            from: None,
            reply_to: None,
        }
    }

    #[test]
    fn request_serializes_recipient_list() {
        let msg = message();
        let request = ResendRequest {
            from: "a@b.c",
            to: vec![msg.to.as_str()],
            subject: &msg.subject,
            html: &msg.html,
            text: None,
            reply_to: "r@b.c",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["to"], serde_json::json!(["parent@example.com"]));
        assert_eq!(json["reply_to"], "r@b.c");
        assert!(json.get("text").is_none());
    }

    #[tokio::test]
    async fn resend_without_key_fails_fast() {
        let provider = ResendProvider::new(EmailConfig::default());
        let err = provider.send(&message()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn mock_records_messages() {
        let mock = MockEmailProvider::new();
        let id = mock.send(&message()).await.unwrap();
        assert_eq!(id.as_deref(), Some("mock-email-1"));
        assert_eq!(mock.send_count(), 1);
        assert_eq!(mock.sent()[0].to, "parent@example.com");

        let failing = MockEmailProvider::failing();
        assert!(failing.send(&message()).await.is_err());
        assert_eq!(failing.send_count(), 0);
    }
}
