#![forbid(unsafe_code)]

use serde_json::{Value, json};
use std::io::{Read, Write};

const MAX_HEADER_BYTES: usize = 8192;
/// Admin forms carry whole protocol texts.
const MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) authorization: Option<String>,
    pub(crate) body: Vec<u8>,
    /// Declared length exceeded the body cap; the body was not read.
    pub(crate) body_too_large: bool,
}

pub(crate) fn read_request(stream: &mut impl Read) -> std::io::Result<Option<HttpRequest>> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::<u8>::new();
    loop {
        let read = match stream.read(&mut buf) {
            Ok(read) => read,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(err) => return Err(err),
        };
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") || data.len() > MAX_HEADER_BYTES {
            break;
        }
    }
    if data.is_empty() {
        return Ok(None);
    }

    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .unwrap_or(data.len());
    let header_bytes = &data[..header_end];
    let mut body = data[header_end..].to_vec();

    let header_text = String::from_utf8_lossy(header_bytes);
    let mut lines = header_text.split("\r\n");
    let Some(request_line) = lines.next() else {
        return Ok(None);
    };
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_ascii_uppercase();
    let path = parts.next().unwrap_or("/").to_string();

    let mut content_length: usize = 0;
    let mut authorization = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse::<usize>().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("authorization") {
            authorization = Some(value.trim().to_string());
        }
    }
    let body_too_large = content_length > MAX_BODY_BYTES;
    if body_too_large {
        body.clear();
        content_length = 0;
    }

    if content_length > body.len() {
        let mut remaining = content_length - body.len();
        while remaining > 0 {
            let read = match stream.read(&mut buf) {
                Ok(read) => read,
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    break;
                }
                Err(err) => return Err(err),
            };
            if read == 0 {
                break;
            }
            let take = read.min(remaining);
            body.extend_from_slice(&buf[..take]);
            remaining = remaining.saturating_sub(take);
        }
    } else {
        body.truncate(content_length);
    }

    Ok(Some(HttpRequest {
        method,
        path,
        authorization,
        body,
        body_too_large,
    }))
}

pub(crate) fn normalize_path(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.split('?').next().unwrap_or(raw);
    let raw = raw.trim();
    if raw.is_empty() {
        return "/".to_string();
    }
    if raw.len() > 256 || raw.contains("..") || raw.contains('\\') {
        return "/".to_string();
    }
    match raw.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Splits a normalized path into percent-decoded segments. `None` when a
/// segment is not valid UTF-8 after decoding.
pub(crate) fn path_segments(path: &str) -> Option<Vec<String>> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(decode_segment)
        .collect()
}

fn decode_segment(value: &str) -> Option<String> {
    let mut out: Vec<u8> = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut idx = 0usize;
    while idx < bytes.len() {
        match bytes[idx] {
            b'%' if idx + 2 < bytes.len() => {
                let hex = |b: u8| match b {
                    b'0'..=b'9' => Some(b - b'0'),
                    b'a'..=b'f' => Some(b - b'a' + 10),
                    b'A'..=b'F' => Some(b - b'A' + 10),
                    _ => None,
                };
                let hi = hex(bytes[idx + 1])?;
                let lo = hex(bytes[idx + 2])?;
                out.push((hi << 4) | lo);
                idx += 3;
            }
            byte => {
                out.push(byte);
                idx += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ApiError {
    pub(crate) status: &'static str,
    pub(crate) code: &'static str,
    pub(crate) message: String,
    pub(crate) recovery: Option<&'static str>,
}

impl ApiError {
    pub(crate) fn new(status: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            recovery: None,
        }
    }

    pub(crate) fn with_recovery(mut self, recovery: &'static str) -> Self {
        self.recovery = Some(recovery);
        self
    }

    pub(crate) fn not_found() -> Self {
        Self::new("404 Not Found", "NOT_FOUND", "Not found.")
    }

    pub(crate) fn method_not_allowed() -> Self {
        Self::new(
            "405 Method Not Allowed",
            "METHOD_NOT_ALLOWED",
            "Method not allowed.",
        )
    }

    pub(crate) fn payload_too_large() -> Self {
        Self::new(
            "413 Payload Too Large",
            "PAYLOAD_TOO_LARGE",
            format!("Request body exceeds {MAX_BODY_BYTES} bytes."),
        )
    }

    pub(crate) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new("400 Bad Request", code, message)
    }

    pub(crate) fn body(&self) -> Value {
        json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "recovery": self.recovery,
            }
        })
    }
}

pub(crate) fn write_json(
    stream: &mut impl Write,
    status: &str,
    body: &Value,
    head_only: bool,
) -> std::io::Result<()> {
    write_response(
        stream,
        status,
        "application/json; charset=utf-8",
        body.to_string().as_bytes(),
        head_only,
    )
}

pub(crate) fn write_api_error(
    stream: &mut impl Write,
    error: &ApiError,
    head_only: bool,
) -> std::io::Result<()> {
    write_json(stream, error.status, &error.body(), head_only)
}

fn write_response(
    stream: &mut impl Write,
    status: &str,
    content_type: &str,
    body: &[u8],
    head_only: bool,
) -> std::io::Result<()> {
    let mut headers = String::new();
    headers.push_str("HTTP/1.1 ");
    headers.push_str(status);
    headers.push_str("\r\n");
    headers.push_str("Content-Type: ");
    headers.push_str(content_type);
    headers.push_str("\r\n");
    headers.push_str("Cache-Control: no-store\r\n");
    headers.push_str("X-Content-Type-Options: nosniff\r\n");
    headers.push_str("Connection: close\r\n");
    headers.push_str("Content-Length: ");
    headers.push_str(&body.len().to_string());
    headers.push_str("\r\n\r\n");

    stream.write_all(headers.as_bytes())?;
    if !head_only {
        stream.write_all(body)?;
    }
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_declared_body() {
        let raw = b"post /api/plots-for-owners HTTP/1.1\r\nHost: x\r\nAUTHORIZATION: Bearer abc\r\n\
content-length: 16\r\n\r\n{\"owner_ids\":[]}trailing";
        let request = read_request(&mut &raw[..])
            .expect("io")
            .expect("request");
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/plots-for-owners");
        assert_eq!(request.authorization.as_deref(), Some("Bearer abc"));
        assert_eq!(request.body, b"{\"owner_ids\":[]}".to_vec());
    }

    #[test]
    fn oversized_body_is_flagged_and_left_unread() {
        let raw = format!(
            "PUT /api/admin/protocols/1 HTTP/1.1\r\nContent-Length: {}\r\n\r\n{{\"owner_name\":",
            MAX_BODY_BYTES + 1
        );
        let request = read_request(&mut raw.as_bytes())
            .expect("io")
            .expect("request");
        assert!(request.body_too_large);
        assert!(request.body.is_empty());

        let error = ApiError::payload_too_large();
        assert_eq!(error.status, "413 Payload Too Large");
        assert_eq!(error.body()["error"]["code"], "PAYLOAD_TOO_LARGE");

        let exact = "POST /x HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}";
        let request = read_request(&mut exact.as_bytes())
            .expect("io")
            .expect("request");
        assert!(!request.body_too_large);
        assert_eq!(request.body, b"{}".to_vec());
    }

    #[test]
    fn empty_connection_yields_no_request() {
        let raw: &[u8] = b"";
        assert!(read_request(&mut &raw[..]).expect("io").is_none());
    }

    #[test]
    fn paths_drop_query_and_reject_traversal() {
        assert_eq!(normalize_path("/api/stats?x=1"), "/api/stats");
        assert_eq!(normalize_path("/api/protocols/"), "/api/protocols");
        assert_eq!(normalize_path("/api/../etc"), "/");
        assert_eq!(normalize_path("  "), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(&format!("/{}", "a".repeat(300))), "/");
    }

    #[test]
    fn segments_are_percent_decoded() {
        let segments = path_segments("/api/protocols/W%C3%93JCIK%20JAN").expect("segments");
        assert_eq!(segments, vec!["api", "protocols", "WÓJCIK JAN"]);
        assert_eq!(
            path_segments("/api/a+b").expect("segments"),
            vec!["api", "a+b"]
        );
        assert!(path_segments("/api/%ZZ").is_none());
        assert!(path_segments("/api/%FF").is_none());
        assert!(path_segments("/api/%4").is_some_and(|s| s[1] == "%4"));
    }

    #[test]
    fn responses_carry_length_and_error_envelope() {
        let mut out = Vec::new();
        let error = ApiError::not_found().with_recovery("Check the protocol key.");
        write_api_error(&mut out, &error, false).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let (head, body) = text.split_once("\r\n\r\n").expect("header end");
        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        let parsed: Value = serde_json::from_str(body).expect("json");
        assert_eq!(parsed["error"]["code"], "NOT_FOUND");
        assert_eq!(parsed["error"]["recovery"], "Check the protocol key.");

        let mut head_only = Vec::new();
        write_json(&mut head_only, "200 OK", &json!({"ok": true}), true).expect("write");
        assert!(String::from_utf8(head_only).expect("utf8").ends_with("\r\n\r\n"));
    }
}
