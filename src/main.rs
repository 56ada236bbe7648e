use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use winprob_alerts::alerts::{DeliveryMethod, SmartAlertEngine};
use winprob_alerts::config::Config;
use winprob_alerts::delivery::{BroadcastChannel, WebhookChannel};
use winprob_alerts::probability::ModelFactory;
use winprob_alerts::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let factory = ModelFactory::with_default_models();
    let mut engine =
        SmartAlertEngine::new(factory).with_queue_capacity(config.alert_queue_capacity);

    // Realtime websocket fan-out is always available
    let realtime = BroadcastChannel::new(config.broadcast_buffer);
    engine.register_delivery_method(DeliveryMethod::WebSocket, Arc::new(realtime.clone()));

    for (method, webhook) in config.webhook_targets() {
        info!("{} alerts relayed to {}", method, webhook.url);
        let channel = WebhookChannel::new(webhook)
            .with_context(|| format!("Failed to set up {} delivery", method))?;
        engine.register_delivery_method(method, Arc::new(channel));
    }

    let engine = Arc::new(engine);

    // Periodically drop delivered alerts from the inspection queue
    if let Some(every) = config.sweep_interval() {
        let sweep_engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let removed = sweep_engine.clear_delivered_alerts().await;
                if removed > 0 {
                    info!("Swept {} delivered alert(s)", removed);
                }
            }
        });
    }

    let app = server::router(AppState { engine, realtime });
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Alert service listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
