use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::DeliveryChannel;
use crate::alerts::Alert;

const MAX_JITTER_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Label used in logs, e.g. "push-gateway"
    pub name: String,
    pub url: String,
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl WebhookConfig {
    pub fn new(name: &str, url: &str) -> Self {
        WebhookConfig {
            name: name.to_string(),
            url: url.to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

/// Posts alerts as JSON to an HTTP endpoint (push, email or SMS gateway).
///
/// Connection errors and 5xx responses are retried with exponential backoff
/// plus jitter; 4xx responses fail immediately.
pub struct WebhookChannel {
    http: Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(WebhookChannel { http, config })
    }

    async fn post_once(&self, alert: &Alert) -> std::result::Result<(), PostError> {
        let resp = self
            .http
            .post(&self.config.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| PostError::Retryable(anyhow::Error::new(e).context("request failed")))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(PostError::Retryable(anyhow::anyhow!("gateway returned {}", status)))
        } else {
            Err(PostError::Fatal(anyhow::anyhow!("gateway rejected alert: {}", status)))
        }
    }
}

enum PostError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Delay before retry number `attempt` (0-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(10)).unwrap_or(1024);
    let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
    base * factor + Duration::from_millis(jitter)
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.post_once(alert).await {
                Ok(()) => {
                    debug!("[{}] delivered alert {}", self.config.name, alert.id);
                    return Ok(());
                }
                Err(PostError::Fatal(e)) => return Err(e),
                Err(PostError::Retryable(e)) if attempt >= self.config.max_retries => {
                    return Err(e.context(format!("gave up after {} attempt(s)", attempt + 1)));
                }
                Err(PostError::Retryable(e)) => {
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    warn!(
                        "[{}] alert {} attempt {} failed: {:#}; retrying in {:?}",
                        self.config.name,
                        alert.id,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
