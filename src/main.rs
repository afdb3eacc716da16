//! octo-bridge - OctoPrint status relay
//!
//! Polls the OctoPrint REST API on a fixed interval and forwards changed
//! status fields to a remote WebSocket endpoint.

mod config;
mod diff;
mod error;
mod logging;
mod models;
mod octoprint;
mod relay;

use std::sync::Arc;

use crate::octoprint::{OctoPrintClient, PrinterSyncer};
use crate::relay::{ConnectionManager, WebSocketTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first: it names the log file
    let config = config::Config::load();
    logging::init(config.as_ref().ok().and_then(|c| c.log_file.as_deref()))?;

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting octo-bridge...");

    let octoprint = OctoPrintClient::new(
        &config.octo_base_url()?,
        config.octo_key.clone(),
        config.request_timeout(),
    )?;
    tracing::info!("Status API: {}", config.octo_base_url()?);

    let relay = Arc::new(ConnectionManager::new(
        Arc::new(WebSocketTransport::new(config.connect_timeout())),
        config.reconnect_delay(),
    ));
    relay.connect(&config.ws_url);

    let syncer = PrinterSyncer::new(
        Arc::new(octoprint),
        relay.clone(),
        config.ws_key.clone(),
        config.poll_interval(),
    );

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => {
                // Without a signal handler the bridge simply runs until killed
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = syncer.start() => {}
        _ = shutdown => {}
    }

    relay.close().await;
    tracing::info!("octo-bridge stopped");

    Ok(())
}
