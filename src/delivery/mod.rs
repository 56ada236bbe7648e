//! Alert delivery.
//!
//! A [`DeliveryDispatcher`] maps each [`DeliveryMethod`] to at most one
//! [`DeliveryChannel`]. Dispatch fans an alert out to every channel the user
//! enabled and that has an implementation, concurrently, and records a
//! per-channel outcome on the alert. One failing channel never blocks the
//! others.

pub mod broadcast;
pub mod webhook;

pub use broadcast::BroadcastChannel;
pub use webhook::{WebhookChannel, WebhookConfig};

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::alerts::{Alert, AlertPreferences, DeliveryMethod, DeliveryStatus};

/// Something that can push an alert to a user.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[derive(Clone, Default)]
pub struct DeliveryDispatcher {
    channels: HashMap<DeliveryMethod, Arc<dyn DeliveryChannel>>,
}

impl DeliveryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the implementation for `method`.
    pub fn register(&mut self, method: DeliveryMethod, channel: Arc<dyn DeliveryChannel>) {
        debug!("Registered {} delivery via {}", method, channel.name());
        self.channels.insert(method, channel);
    }

    pub fn is_registered(&self, method: DeliveryMethod) -> bool {
        self.channels.contains_key(&method)
    }

    pub fn registered_methods(&self) -> Vec<DeliveryMethod> {
        let mut methods: Vec<_> = self.channels.keys().copied().collect();
        methods.sort();
        methods
    }

    /// Deliver `alert` through every enabled, registered channel.
    ///
    /// Sets `attempted` when at least one channel was tried and `delivered`
    /// when at least one succeeded. Enabled methods with no registered
    /// channel are skipped without a status entry.
    pub async fn dispatch(&self, alert: &mut Alert, preferences: &AlertPreferences) {
        let targets: Vec<(DeliveryMethod, Arc<dyn DeliveryChannel>)> = DeliveryMethod::ALL
            .iter()
            .filter(|m| preferences.wants_delivery(**m))
            .filter_map(|m| self.channels.get(m).map(|c| (*m, Arc::clone(c))))
            .collect();

        if targets.is_empty() {
            debug!(
                "Alert {} for user {} has no deliverable channel",
                alert.id, alert.user_id
            );
            return;
        }

        let snapshot: &Alert = alert;
        let futures: Vec<_> = targets
            .iter()
            .map(|(method, channel)| async move {
                let outcome = channel.deliver(snapshot).await;
                (*method, channel.name().to_string(), outcome)
            })
            .collect();
        let results = futures_util::future::join_all(futures).await;

        alert.attempted = true;
        for (method, channel_name, outcome) in results {
            let status = match outcome {
                Ok(()) => DeliveryStatus::Sent,
                Err(e) => {
                    warn!(
                        "{} delivery of alert {} to user {} failed via {}: {:#}",
                        method, alert.id, alert.user_id, channel_name, e
                    );
                    DeliveryStatus::Failed {
                        error: format!("{:#}", e),
                    }
                }
            };
            alert.delivery_status.insert(method, status);
        }
        alert.delivered = alert.delivery_status.values().any(DeliveryStatus::is_sent);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Channel that records what it was handed, optionally failing.
    #[derive(Default)]
    pub struct RecordingChannel {
        pub fail: bool,
        pub seen: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        pub fn failing() -> Self {
            RecordingChannel {
                fail: true,
                ..Self::default()
            }
        }

        pub fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        async fn deliver(&self, alert: &Alert) -> Result<()> {
            self.seen.lock().unwrap().push(alert.id.clone());
            if self.fail {
                anyhow::bail!("channel offline");
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }
}
