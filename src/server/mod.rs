//! Server core functionality
//!
//! This module contains the main server implementation and configuration.

pub mod config;
pub mod core;

pub use config::ServerConfig;
pub use core::Server;
