//! `multipart/form-data` parsing
//!
//! Splits a fully buffered body into its parts.

use crate::error::ProtocolError;

/// One form field or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    /// Field content as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Extracts the boundary parameter from a `Content-Type` header.
pub fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Parses `body` delimited by `boundary`.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>, ProtocolError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let next_delimiter = format!("\r\n--{}", boundary).into_bytes();

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| malformed("missing opening boundary"))?
        + delimiter.len();
    let mut parts = Vec::new();

    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(malformed("boundary not followed by CRLF"));
        }
        pos += 2;

        let header_end =
            find(body, b"\r\n\r\n", pos).ok_or_else(|| malformed("unterminated part headers"))?;
        let headers = String::from_utf8_lossy(&body[pos..header_end]).into_owned();
        let data_start = header_end + 4;

        let data_end = find(body, &next_delimiter, data_start)
            .ok_or_else(|| malformed("missing closing boundary"))?;
        parts.push(build_part(&headers, body[data_start..data_end].to_vec())?);

        pos = data_end + next_delimiter.len();
        if pos > body.len() {
            return Err(malformed("truncated body"));
        }
    }

    Ok(parts)
}

fn build_part(headers: &str, data: Vec<u8>) -> Result<Part, ProtocolError> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    Ok(Part {
        name: name.ok_or_else(|| malformed("part without a name"))?,
        filename,
        content_type,
        data,
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

fn malformed(reason: &str) -> ProtocolError {
    ProtocolError::MalformedRequest(format!("multipart: {}", reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----rax1234";

    fn sample_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"------rax1234\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"folder\"\r\n\r\n");
        body.extend_from_slice(b"docs\r\n");
        body.extend_from_slice(b"------rax1234\r\n");
        body.extend_from_slice(
            "Content-Disposition: form-data; name=\"file\"; filename=\"报告.txt\"\r\n".as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
        body.extend_from_slice(b"line one\r\nline two");
        body.extend_from_slice(b"\r\n------rax1234--\r\n");
        body
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=----rax1234").as_deref(),
            Some(BOUNDARY)
        );
        assert_eq!(
            boundary("multipart/form-data; boundary=\"abc\"").as_deref(),
            Some("abc")
        );
        assert_eq!(boundary("application/json"), None);
    }

    #[test]
    fn test_parse_fields_and_file() {
        let parts = parse(&sample_body(), BOUNDARY).unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name, "folder");
        assert_eq!(parts[0].filename, None);
        assert_eq!(parts[0].text(), "docs");

        assert_eq!(parts[1].name, "file");
        assert_eq!(parts[1].filename.as_deref(), Some("报告.txt"));
        assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));
        assert_eq!(parts[1].data, b"line one\r\nline two");
    }

    #[test]
    fn test_missing_closing_boundary_is_rejected() {
        let body = b"------rax1234\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue";
        assert!(parse(body, BOUNDARY).is_err());
    }
}
