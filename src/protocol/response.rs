//! HTTP response building and writing

use serde_json::{Value, json};
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DriveError;
use crate::error::handlers::{error_to_status, handle_error};

pub const OK: u16 = 200;
pub const NOT_FOUND: u16 = 404;
pub const METHOD_NOT_ALLOWED: u16 = 405;

#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// Streamed from disk when written
    File { path: PathBuf, len: u64 },
}

#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn json(status: u16, value: Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(Body::Bytes(value.to_string().into_bytes()))
    }

    /// `200` with `success: true` merged into `value`.
    pub fn ok(mut value: Value) -> Self {
        if let Value::Object(map) = &mut value {
            map.insert("success".into(), Value::Bool(true));
        }
        Self::json(OK, value)
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "success": false, "error": message.into() }))
    }

    /// Logs `err` and renders it with its mapped status.
    pub fn from_error(err: &DriveError) -> Self {
        handle_error(err);
        Self::error(error_to_status(err), err.to_string())
    }

    pub fn file(path: PathBuf, len: u64, content_type: &str) -> Self {
        Self::new(OK)
            .with_header("Content-Type", content_type)
            .with_body(Body::File { path, len })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body bytes, if buffered in memory.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes.as_slice()),
            Body::Empty => Some(&[][..]),
            Body::File { .. } => None,
        }
    }

    fn content_length(&self) -> u64 {
        match &self.body {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    /// Writes status line, headers and body, then flushes.
    pub async fn write_to<W>(self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.content_length()));
        head.push_str("Connection: close\r\n\r\n");
        writer.write_all(head.as_bytes()).await?;

        match self.body {
            Body::Empty => {}
            Body::Bytes(bytes) => writer.write_all(&bytes).await?,
            Body::File { path, len } => {
                let file = tokio::fs::File::open(&path).await?;
                let copied = tokio::io::copy(&mut file.take(len), writer).await?;
                if copied < len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} shrank while streaming", path.display()),
                    ));
                }
            }
        }

        writer.flush().await
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
