//! Error handlers
//!
//! Maps drive errors onto HTTP status codes and logs them.

use crate::error::types::{DriveError, ErrorKind, ProtocolError};
use log::{error, warn};

/// Log a drive error at a level matching its severity
pub fn handle_error(err: &DriveError) {
    match err.kind() {
        ErrorKind::IoFailure => error!("Drive error: {}", err),
        _ => warn!("Request rejected: {}", err),
    }
}

/// Convert error to HTTP status code
pub fn error_to_status(err: &DriveError) -> u16 {
    if let DriveError::Protocol(ProtocolError::PayloadTooLarge(_)) = err {
        return 413;
    }
    match err.kind() {
        ErrorKind::InvalidPath => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::Conflict => 400,
        ErrorKind::BadRequest => 400,
        ErrorKind::IoFailure => 500,
    }
}
