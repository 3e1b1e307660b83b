//! RAX Drive - Entry Point
//!
//! A personal network drive serving one directory tree over HTTP.

use log::{error, info};
use std::process;

use rax_drive::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    info!("Launching drive server...");

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            process::exit(1);
        }
    };
    server.start().await;
}
