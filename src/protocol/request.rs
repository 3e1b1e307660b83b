//! HTTP request parsing
//!
//! Reads one HTTP/1.1 request from a buffered stream: request line,
//! headers, then a `Content-Length` body. Chunked bodies are not accepted.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ProtocolError;
use crate::protocol::encoding::{parse_query, percent_decode};

/// Upper bound for the request line plus all headers.
pub const MAX_HEADER_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    /// Percent-decoded path without the query string
    pub path: String,
    pub query: HashMap<String, String>,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Reads the request line and headers, leaving the body unread.
    pub async fn read_head<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut consumed = 0;
        let request_line = match read_line(reader, &mut consumed).await? {
            Some(line) => line,
            None => return Err(ProtocolError::ConnectionClosed),
        };

        let mut parts = request_line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v)) => (m, t, v),
            _ => {
                return Err(ProtocolError::MalformedRequest(format!(
                    "bad request line: {}",
                    request_line
                )));
            }
        };
        if !version.starts_with("HTTP/1.") {
            return Err(ProtocolError::MalformedRequest(format!(
                "unsupported version: {}",
                version
            )));
        }

        let (raw_path, raw_query) = target.split_once('?').unwrap_or((target, ""));
        let mut request = Request {
            method: method.to_ascii_uppercase(),
            path: percent_decode(raw_path, false),
            query: parse_query(raw_query),
            ..Request::default()
        };

        loop {
            let line = read_line(reader, &mut consumed)
                .await?
                .ok_or_else(|| ProtocolError::MalformedRequest("unexpected end of headers".into()))?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ProtocolError::MalformedRequest(format!("bad header line: {}", line))
            })?;
            request
                .headers
                .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(request)
    }

    /// Declared body length, checked against `max_body`.
    pub fn content_length(&self, max_body: u64) -> Result<u64, ProtocolError> {
        if let Some(encoding) = self.header("transfer-encoding") {
            if encoding.to_ascii_lowercase().contains("chunked") {
                return Err(ProtocolError::MalformedRequest(
                    "chunked transfer encoding is not supported".into(),
                ));
            }
        }

        let length = match self.header("content-length") {
            Some(value) => value.parse::<u64>().map_err(|_| {
                ProtocolError::MalformedRequest(format!("bad Content-Length: {}", value))
            })?,
            None => 0,
        };

        if length > max_body {
            return Err(ProtocolError::PayloadTooLarge(max_body));
        }
        Ok(length)
    }

    /// Reads exactly `Content-Length` bytes of body.
    pub async fn read_body<R>(&mut self, reader: &mut R, max_body: u64) -> Result<(), ProtocolError>
    where
        R: AsyncBufRead + Unpin,
    {
        let length = self.content_length(max_body)?;
        let length = usize::try_from(length).map_err(|_| ProtocolError::PayloadTooLarge(max_body))?;

        let mut body = vec![0; length];
        reader.read_exact(&mut body).await.map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ProtocolError::MalformedRequest("body shorter than Content-Length".into())
            }
            _ => ProtocolError::IoError(e),
        })?;
        self.body = body;
        Ok(())
    }

    /// Reads a complete request.
    pub async fn read_from<R>(reader: &mut R, max_body: u64) -> Result<Self, ProtocolError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut request = Self::read_head(reader).await?;
        request.read_body(reader, max_body).await?;
        Ok(request)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Does the client wait for `100 Continue` before sending the body?
    pub fn expects_continue(&self) -> bool {
        self.header("expect")
            .is_some_and(|value| value.eq_ignore_ascii_case("100-continue"))
    }

    /// Deserializes the JSON body. An empty body reads as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let body = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"{}".as_slice()
        } else {
            self.body.as_slice()
        };
        serde_json::from_slice(body).map_err(ProtocolError::InvalidJson)
    }
}

/// Reads one CRLF (or LF) terminated line, counting it against the header
/// budget. `None` means the stream ended before any byte was read.
async fn read_line<R>(reader: &mut R, consumed: &mut usize) -> Result<Option<String>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let remaining = MAX_HEADER_BYTES.saturating_sub(*consumed);
    if remaining == 0 {
        return Err(ProtocolError::HeaderTooLarge);
    }

    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(remaining as u64)
        .read_until(b'\n', &mut line)
        .await?;
    *consumed += n;

    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        return Err(if *consumed >= MAX_HEADER_BYTES {
            ProtocolError::HeaderTooLarge
        } else {
            ProtocolError::MalformedRequest("unexpected end of headers".into())
        });
    }

    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tokio::io::BufReader;

    async fn parse(raw: &[u8], max_body: u64) -> Result<Request, ProtocolError> {
        let mut reader = BufReader::new(raw);
        Request::read_from(&mut reader, max_body).await
    }

    #[tokio::test]
    async fn test_parse_get_with_query() {
        let raw = b"GET /api/download?path=docs%2F%E6%8A%A5%E5%91%8A.txt HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = parse(raw, 1024).await.unwrap();

        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/api/download");
        assert_eq!(request.query_param("path"), Some("docs/报告.txt"));
        assert_eq!(request.header("HOST"), Some("localhost"));
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_parse_json_body() {
        #[derive(Deserialize)]
        struct Body {
            path: String,
        }

        let raw = b"DELETE /api/delete HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 17\r\n\r\n{\"path\":\"a.txt\"}\n";
        let request = parse(raw, 1024).await.unwrap();
        let body: Body = request.json().unwrap();
        assert_eq!(body.path, "a.txt");
    }

    #[tokio::test]
    async fn test_empty_body_reads_as_empty_object() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Body {
            undo_id: String,
        }

        let raw = b"POST /api/restore-all HTTP/1.1\r\n\r\n";
        let request = parse(raw, 1024).await.unwrap();
        let body: Body = request.json().unwrap();
        assert!(body.undo_id.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected() {
        let raw = b"POST /api/upload HTTP/1.1\r\nContent-Length: 2048\r\n\r\n";
        assert!(matches!(
            parse(raw, 1024).await,
            Err(ProtocolError::PayloadTooLarge(1024))
        ));
    }

    #[tokio::test]
    async fn test_chunked_is_rejected() {
        let raw = b"POST /api/upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n";
        assert!(matches!(
            parse(raw, 1024).await,
            Err(ProtocolError::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_short_body_is_malformed() {
        let raw = b"POST /api/move HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        assert!(matches!(
            parse(raw, 1024).await,
            Err(ProtocolError::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_stream_is_closed_connection() {
        assert!(matches!(
            parse(b"", 1024).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_headers_are_rejected() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
        raw.extend(std::iter::repeat_n(b'a', MAX_HEADER_BYTES));
        raw.extend_from_slice(b"\r\n\r\n");
        assert!(matches!(
            parse(&raw, 1024).await,
            Err(ProtocolError::HeaderTooLarge)
        ));
    }
}
