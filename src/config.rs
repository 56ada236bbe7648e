use clap::Parser;
use std::time::Duration;

use crate::alerts::DeliveryMethod;
use crate::delivery::WebhookConfig;

/// Live win-probability alert service
#[derive(Parser, Debug, Clone)]
#[command(name = "winprob-alerts", version, about)]
pub struct Config {
    /// HTTP / websocket listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Push notification gateway webhook
    #[arg(long, env = "PUSH_WEBHOOK_URL")]
    pub push_webhook_url: Option<String>,

    /// Email relay webhook
    #[arg(long, env = "EMAIL_WEBHOOK_URL")]
    pub email_webhook_url: Option<String>,

    /// SMS relay webhook
    #[arg(long, env = "SMS_WEBHOOK_URL")]
    pub sms_webhook_url: Option<String>,

    /// Per-request timeout for webhook deliveries, in seconds
    #[arg(long, env = "WEBHOOK_TIMEOUT_SECS", default_value = "5")]
    pub webhook_timeout_secs: u64,

    /// Retries after a failed webhook delivery
    #[arg(long, env = "WEBHOOK_MAX_RETRIES", default_value = "2")]
    pub webhook_max_retries: u32,

    /// Maximum alerts kept for inspection
    #[arg(long, env = "ALERT_QUEUE_CAPACITY", default_value = "1000")]
    pub alert_queue_capacity: usize,

    /// Interval between sweeps of delivered alerts, in seconds (0 disables)
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,

    /// Alerts buffered per realtime subscriber before it starts lagging
    #[arg(long, env = "BROADCAST_BUFFER", default_value = "256")]
    pub broadcast_buffer: usize,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("listen_addr '{}' is not a socket address", self.listen_addr);
        }
        for (method, url) in self.webhook_urls() {
            let parsed = url::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("{} webhook URL '{}' is invalid: {}", method, url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{} webhook URL must be http or https, got '{}'", method, parsed.scheme());
            }
        }
        if self.webhook_timeout_secs == 0 {
            anyhow::bail!("webhook_timeout_secs must be positive");
        }
        if self.webhook_max_retries > 10 {
            anyhow::bail!("webhook_max_retries must be at most 10");
        }
        if self.alert_queue_capacity == 0 {
            anyhow::bail!("alert_queue_capacity must be positive");
        }
        if self.broadcast_buffer == 0 {
            anyhow::bail!("broadcast_buffer must be positive");
        }
        Ok(())
    }

    fn webhook_urls(&self) -> Vec<(DeliveryMethod, &str)> {
        [
            (DeliveryMethod::Push, &self.push_webhook_url),
            (DeliveryMethod::Email, &self.email_webhook_url),
            (DeliveryMethod::Sms, &self.sms_webhook_url),
        ]
        .into_iter()
        .filter_map(|(m, url)| url.as_deref().map(|u| (m, u)))
        .collect()
    }

    /// One webhook channel config per configured relay.
    pub fn webhook_targets(&self) -> Vec<(DeliveryMethod, WebhookConfig)> {
        self.webhook_urls()
            .into_iter()
            .map(|(method, url)| {
                let config = WebhookConfig {
                    timeout: Duration::from_secs(self.webhook_timeout_secs),
                    max_retries: self.webhook_max_retries,
                    ..WebhookConfig::new(&format!("{}-webhook", method), url)
                };
                (method, config)
            })
            .collect()
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
