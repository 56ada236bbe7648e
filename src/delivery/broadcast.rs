use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::DeliveryChannel;
use crate::alerts::Alert;

/// In-process fan-out used for the websocket delivery method. Every
/// connected socket holds a receiver; slow receivers lag and lose the
/// oldest alerts rather than blocking delivery.
#[derive(Clone)]
pub struct BroadcastChannel {
    tx: broadcast::Sender<Arc<Alert>>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastChannel { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Alert>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl DeliveryChannel for BroadcastChannel {
    fn name(&self) -> &str {
        "websocket-broadcast"
    }

    /// Fails when nobody is connected, so the alert is not counted as
    /// delivered.
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        self.tx
            .send(Arc::new(alert.clone()))
            .map(|_| ())
            .map_err(|_| anyhow::anyhow!("no connected websocket subscribers"))
    }
}
