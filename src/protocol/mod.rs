//! HTTP protocol implementation
//!
//! Handles request parsing, multipart bodies, percent coding, routing and
//! response generation.

pub mod encoding;
pub mod handlers;
pub mod multipart;
pub mod request;
pub mod response;

pub use handlers::{Route, handle_request};
pub use request::Request;
pub use response::Response;
