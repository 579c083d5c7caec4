//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! CORD_TOKEN="Bot ..." cargo run -p cord-gateway
//! ```
//!
//! Connects with configuration from the environment and logs every event
//! until interrupted.

use anyhow::Context;
use cord_common::{try_init_tracing, ClientConfig};
use cord_core::events::{MessageCreate, Ready};
use cord_core::Event;
use cord_gateway::Client;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("failed to load configuration")?;
    info!(
        api_base = %config.rest.api_base,
        shard_id = config.gateway.shard_id,
        shard_count = config.gateway.shard_count,
        "Configuration loaded"
    );

    let client = Client::new(config).context("failed to build client")?;

    client.add_handler(|ready: Ready| async move {
        info!(
            user = %ready.user.username,
            session_id = %ready.session_id,
            guilds = ready.guilds.len(),
            "ready"
        );
    });
    client.add_handler(|message: MessageCreate| async move {
        info!(
            channel_id = %message.channel_id,
            author = %message.author.as_ref().map_or("", |a| a.username.as_str()),
            content = %message.content,
            "message"
        );
    });
    client.add_any_handler(|event: Arc<Event>| async move {
        tracing::debug!(kind = %event.kind(), "event");
    });

    client.open().await.context("failed to open gateway")?;
    info!("connected, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down");
    client.close().await;
    Ok(())
}
