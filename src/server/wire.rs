//! HTTP/1.1 wire codec: byte stream to request parts, response parts to
//! byte stream.
//!
//! Only `Content-Length` framing is supported; bodies are buffered whole.
//! The serializer always emits the status line, `Content-Length` and
//! `Content-Type`, then any extra headers the handler set. Extra headers are
//! written verbatim, so a handler that sets its own `Content-Type` produces a
//! duplicate line; callers that care use `Res::set_type` instead.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use tracing::{debug, warn};

/// Read one CRLF/LF-terminated line. `Ok(None)` means a clean EOF before any
/// byte arrived.
pub fn read_line<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read the header block: lines until the first empty line.
///
/// Returns the header map (exact on-the-wire names, last value wins) and the
/// accumulated `Content-Length`. A line whose `Content-Length` value does not
/// parse contributes 0. Lines without a `: ` separator are skipped.
pub fn extract_headers<R: BufRead>(
    reader: &mut R,
) -> std::io::Result<(HashMap<String, String>, usize)> {
    let mut headers = HashMap::new();
    let mut content_length = 0usize;

    loop {
        let line = match read_line(reader)? {
            Some(line) => line,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed inside header block",
                ))
            }
        };

        if line.starts_with("Content-Length") {
            content_length = line
                .split_once(':')
                .map(|(_, v)| v.trim().parse().unwrap_or(0))
                .unwrap_or(0);
        }

        let line = line.trim();
        if line.is_empty() {
            break;
        }

        let Some((name, value)) = line.split_once(": ") else {
            debug!(line, "skipping header line without separator");
            continue;
        };
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    Ok((headers, content_length))
}

/// Read exactly `content_length` body bytes. A short read yields an empty
/// body rather than a fatal error.
pub fn extract_body<R: BufRead>(reader: &mut R, content_length: usize) -> Vec<u8> {
    if content_length == 0 {
        return Vec::new();
    }

    let mut body = vec![0u8; content_length];
    if let Err(e) = reader.read_exact(&mut body) {
        warn!(error = %e, content_length, "short read on request body");
        return Vec::new();
    }
    body
}

/// Parse the raw query string. Values are handed to user code exactly as they
/// appeared on the wire; no percent-decoding is performed.
pub fn extract_queries(raw: &str) -> HashMap<String, String> {
    let mut queries = HashMap::new();
    if raw.is_empty() {
        return queries;
    }

    for pair in raw.split('&') {
        match pair.split_once('=') {
            Some((key, value)) => queries.insert(key.to_string(), value.to_string()),
            None => queries.insert(pair.to_string(), String::new()),
        };
    }

    queries
}

/// Parse the `Cookie` request header into name/value pairs. Fragments without
/// an `=` are dropped; a value containing `=` keeps everything after the
/// first one.
pub fn extract_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    if let Some(header) = headers.get("Cookie") {
        for pair in header.split(';') {
            let pair = pair.trim();
            let mut pieces = pair.split('=');
            let (Some(name), Some(value)) = (pieces.next(), pieces.next()) else {
                continue;
            };
            if pieces.next().is_some() {
                // More than one '=': the original parser rejects these.
                continue;
            }
            if name.is_empty() {
                continue;
            }
            cookies.insert(name.to_string(), value.to_string());
        }
    }

    cookies
}

/// Reason phrase for a status code; codes outside the standard table render
/// as `Unknown Status`.
pub fn status_reason(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// Serialize one complete response onto the socket.
///
/// Write errors are logged and swallowed; by the time they surface there is
/// nothing useful left to tell the client.
pub fn send_response(
    socket: &mut dyn Write,
    body: &[u8],
    code: u16,
    content_type: &str,
    headers: Option<&HashMap<String, Vec<String>>>,
) {
    let mut head = Vec::with_capacity(128);
    let _ = write!(head, "HTTP/1.1 {} {}\r\n", code, status_reason(code));
    let _ = write!(head, "Content-Length: {}\r\n", body.len());
    let _ = write!(head, "Content-Type: {content_type}\r\n");

    if let Some(headers) = headers {
        for (name, values) in headers {
            for value in values {
                let _ = write!(head, "{name}: {value}\r\n");
            }
        }
    }
    head.extend_from_slice(b"\r\n");

    if let Err(e) = socket.write_all(&head) {
        warn!(error = %e, "error writing response head");
        return;
    }
    if let Err(e) = socket.write_all(body) {
        warn!(error = %e, "error writing response body");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn test_extract_headers() {
        let raw = "Content-Length: 20\r\nHeader1: header1\r\nHeader2: header2\r\n\r\n";
        let mut reader = BufReader::new(raw.as_bytes());

        let (headers, len) = extract_headers(&mut reader).unwrap();
        assert_eq!(headers.get("Content-Length").unwrap(), "20");
        assert_eq!(headers.get("Header1").unwrap(), "header1");
        assert_eq!(headers.get("Header2").unwrap(), "header2");
        assert_eq!(len, 20);
    }

    #[test]
    fn test_extract_headers_last_value_wins() {
        let raw = "X-Tag: one\r\nX-Tag: two\r\n\r\n";
        let mut reader = BufReader::new(raw.as_bytes());
        let (headers, _) = extract_headers(&mut reader).unwrap();
        assert_eq!(headers.get("X-Tag").unwrap(), "two");
    }

    #[test]
    fn test_extract_headers_invalid_content_length() {
        let raw = "Content-Length: banana\r\n\r\n";
        let mut reader = BufReader::new(raw.as_bytes());
        let (_, len) = extract_headers(&mut reader).unwrap();
        assert_eq!(len, 0);
    }

    #[test]
    fn test_extract_headers_skips_separatorless_lines() {
        let raw = "garbage line\r\nGood: value\r\n\r\n";
        let mut reader = BufReader::new(raw.as_bytes());
        let (headers, _) = extract_headers(&mut reader).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Good").unwrap(), "value");
    }

    #[test]
    fn test_extract_body() {
        let mut reader = BufReader::new("Hello, world!".as_bytes());
        assert_eq!(extract_body(&mut reader, 13), b"Hello, world!");
    }

    #[test]
    fn test_extract_body_short_read() {
        let mut reader = BufReader::new("abc".as_bytes());
        assert!(extract_body(&mut reader, 10).is_empty());
    }

    #[test]
    fn test_extract_queries() {
        let qs = extract_queries("userId=2&name=zkr&category=admin");
        assert_eq!(qs.len(), 3);
        assert_eq!(qs.get("userId").unwrap(), "2");
        assert_eq!(qs.get("name").unwrap(), "zkr");

        let qs = extract_queries("userId=1&category=");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs.get("category").unwrap(), "");

        let qs = extract_queries("flag");
        assert_eq!(qs.get("flag").unwrap(), "");

        assert!(extract_queries("").is_empty());
    }

    #[test]
    fn test_queries_stay_raw() {
        let qs = extract_queries("q=a%20b%26c");
        assert_eq!(qs.get("q").unwrap(), "a%20b%26c");
    }

    #[test]
    fn test_extract_cookies() {
        let mut headers = HashMap::new();
        headers.insert("Cookie".to_string(), "sessionId=abc123; user=zkr;".to_string());
        let cookies = extract_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies.get("sessionId").unwrap(), "abc123");
        assert_eq!(cookies.get("user").unwrap(), "zkr");

        let mut headers = HashMap::new();
        headers.insert("Cookie".to_string(), "badcookie; valid=1; foo=bar=baz".to_string());
        let cookies = extract_cookies(&headers);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("valid").unwrap(), "1");
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(599), "Unknown Status");
    }

    #[test]
    fn test_send_response_exact_bytes() {
        let mut out = Vec::new();
        send_response(&mut out, b"OK", 200, "text/plain; charset=utf-8", None);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nOK"
        );
    }
}
