//! CLI for roomcast
//!
//! Subcommands:
//! - `server`: run the WebSocket server

use std::sync::Arc;

use clap::Parser;
use roomcast::broker::Broker;
use roomcast::config::load_config_from;
use roomcast::persistence::SledStore;
use roomcast::room::RoomService;
use roomcast::transport::websocket::start_websocket_server;
use roomcast::utils::ids::UuidGenerator;
use roomcast::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "roomcast")]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Configuration file stem, without extension
        #[arg(long, default_value = "config/default")]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    match Command::parse() {
        Command::Server { config } => {
            if let Err(e) = run_server(&config).await {
                // logging may not be up yet if the config itself failed
                logging::init("info");
                error!("Server failed: {}", e);
            }
        }
    }
}

async fn run_server(config_file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_from(config_file)?;
    logging::init(&config.log.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let store = Arc::new(SledStore::open(&config.storage.path)?);
    let broker = Arc::new(Broker::with_capacity(config.broker.queue_capacity));
    let service = Arc::new(RoomService::new(
        store.clone(),
        Arc::new(UuidGenerator),
        broker.clone(),
    ));
    service.restore_topics()?;

    tokio::select! {
        result = start_websocket_server(&addr, service) => {
            match result {
                Ok(()) => error!("WebSocket server exited unexpectedly."),
                Err(e) => error!("WebSocket server failed on {addr}: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.shutdown();
    store.flush()?;
    Ok(())
}
