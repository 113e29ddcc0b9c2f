use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::RevenueCatConfig;
use crate::voucher::domain::promotional_duration;

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Grant rejected: {0}")]
    Rejected(String),
}

/// Grants premium access for a number of months to a billing customer.
#[async_trait]
pub trait EntitlementGranter: Send + Sync {
    async fn grant(&self, app_user_id: &str, duration_months: i64) -> Result<(), EntitlementError>;
}

pub type DynEntitlementGranter = Arc<dyn EntitlementGranter>;

#[derive(Debug, Serialize)]
struct PromotionalGrant<'a> {
    duration: &'a str,
    start_time_ms: i64,
}

/// RevenueCat promotional entitlements (REST v1).
pub struct RevenueCatClient {
    config: RevenueCatConfig,
    client: Client,
}

impl RevenueCatClient {
    pub fn new(config: RevenueCatConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// `{base}/subscribers/{app_user_id}/entitlements/{entitlement}/promotional`,
    /// with the customer id percent-encoded as one path segment.
    fn grant_url(&self, app_user_id: &str) -> Result<Url, EntitlementError> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            EntitlementError::Configuration(format!("Invalid RevenueCat base URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                EntitlementError::Configuration("RevenueCat base URL cannot hold a path".into())
            })?
            .pop_if_empty()
            .extend([
                "subscribers",
                app_user_id,
                "entitlements",
                self.config.entitlement_identifier.as_str(),
                "promotional",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl EntitlementGranter for RevenueCatClient {
    async fn grant(&self, app_user_id: &str, duration_months: i64) -> Result<(), EntitlementError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            EntitlementError::Configuration("RevenueCat API key not configured".into())
        })?;

        let body = PromotionalGrant {
            duration: promotional_duration(duration_months),
            start_time_ms: Utc::now().timestamp_millis(),
        };

        let response = self
            .client
            .post(self.grant_url(app_user_id)?)
            .bearer_auth(api_key)
            .header("X-Platform", "stripe")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EntitlementError::Connection(format!("Failed to reach RevenueCat: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %detail, "RevenueCat grant failed");
            return Err(EntitlementError::Rejected(format!(
                "RevenueCat API error: {}",
                status.as_u16()
            )));
        }

        tracing::info!(
            app_user_id = %app_user_id,
            duration = body.duration,
            "Promotional entitlement granted"
        );
        Ok(())
    }
}

/// Mock granter for testing
pub struct MockEntitlementGranter {
    fail: bool,
    grant_count: AtomicU64,
}

impl MockEntitlementGranter {
    pub fn new() -> Self {
        Self {
            fail: false,
            grant_count: AtomicU64::new(0),
        }
    }

    /// A granter whose every call fails like an upstream outage.
    pub fn failing() -> Self {
        Self {
            fail: true,
            grant_count: AtomicU64::new(0),
        }
    }

    pub fn grant_count(&self) -> u64 {
        self.grant_count.load(Ordering::SeqCst)
    }
}

impl Default for MockEntitlementGranter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitlementGranter for MockEntitlementGranter {
    async fn grant(&self, app_user_id: &str, duration_months: i64) -> Result<(), EntitlementError> {
        if self.fail {
            return Err(EntitlementError::Rejected("RevenueCat API error: 503".into()));
        }
        self.grant_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            app_user_id = %app_user_id,
            duration = promotional_duration(duration_months),
            "[MOCK] Entitlement would be granted"
        );
        Ok(())
    }
}
