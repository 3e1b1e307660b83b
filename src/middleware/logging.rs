//! Logging middleware
//!
//! Provides request logging functionality.

use log::{debug, info, warn};
use std::net::SocketAddr;

/// Log a client connection
pub fn log_connection(client_addr: &SocketAddr) {
    debug!("Client connected: {}", client_addr);
}

/// Log a completed request
pub fn log_request(client_addr: &SocketAddr, method: &str, path: &str, status: u16) {
    if status >= 500 {
        warn!("{} {} {} -> {}", client_addr, method, path, status);
    } else {
        info!("{} {} {} -> {}", client_addr, method, path, status);
    }
}
