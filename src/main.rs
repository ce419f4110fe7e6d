use std::sync::Arc;

use eventrelay::broker::{BrokerGate, connect};
use eventrelay::config::load_config;
use eventrelay::hub::BroadcastHub;
use eventrelay::relay::RelayService;
use eventrelay::transport::{start_http_server, start_websocket_server};
use eventrelay::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // logging may not be initialized yet
        eprintln!("Relay failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let config = load_config()?;
    logging::init(&config.logging.level);

    let gate = BrokerGate::new(config.broker.enabled);
    let backend = connect(&config.broker)?;
    let hub = Arc::new(BroadcastHub::new());
    let relay = Arc::new(RelayService::new(
        config.broker.clone(),
        backend,
        gate,
        Arc::clone(&hub),
    ));
    relay.start().await?;

    let http_addr = config.server.http_addr();
    let ws_addr = config.server.ws_addr();
    tokio::select! {
        result = start_http_server(&http_addr, Arc::clone(&relay)) => {
            error!("HTTP server exited unexpectedly: {:?}", result);
        }
        result = start_websocket_server(&ws_addr, hub) => {
            error!("WebSocket server exited unexpectedly: {:?}", result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    relay.shutdown().await;
    Ok(())
}
