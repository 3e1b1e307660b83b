//! Server middleware
//!
//! Provides request logging.

pub mod logging;

pub use logging::{log_connection, log_request};
