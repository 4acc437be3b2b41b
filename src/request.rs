//! The request half of a handler invocation.
//!
//! `Req` is owned by the connection loop for the lifetime of one request.
//! Header lookup is case-sensitive and mirrors the wire exactly; see
//! [`Req::header_ci`] for the tolerant variant. Query values are raw: no
//! percent-decoding is applied anywhere.

use crate::error::Error;
use crate::freshness;
use crate::multipart::{self, FormFile};
use crate::negotiate;
use crate::response::Res;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

/// A parsed HTTP request.
#[derive(Debug, Default, Clone)]
pub struct Req {
    /// Local address of the accepting socket, used as the last-resort answer
    /// for [`Req::ip`].
    pub local_address: String,
    /// Uppercase method token as received.
    pub method: String,
    /// Decoded request path with the query string stripped.
    pub path: String,
    /// Raw body bytes, buffered whole.
    pub body: Vec<u8>,
    /// Header map with on-the-wire names; last value wins on duplicates.
    pub headers: HashMap<String, String>,
    /// Captures from `:name` route segments.
    pub params: HashMap<String, String>,
    /// Raw query parameters.
    pub queries: HashMap<String, String>,
    /// Pairs from the `Cookie` header.
    pub cookies: HashMap<String, String>,
}

impl Req {
    /// Value of the header `key`, or the empty string. Exact, case-sensitive
    /// name comparison.
    pub fn header(&self, key: &str) -> &str {
        self.headers.get(key).map(String::as_str).unwrap_or("")
    }

    /// Case-insensitive header lookup for callers that cannot rely on the
    /// client's capitalization.
    pub fn header_ci(&self, key: &str) -> &str {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// Value of the route parameter `key`, or the empty string.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map(String::as_str).unwrap_or("")
    }

    /// Value of the query parameter `key`, or the empty string.
    pub fn query(&self, key: &str) -> &str {
        self.queries.get(key).map(String::as_str).unwrap_or("")
    }

    /// The body as text. Lossy for the rare non-UTF-8 payload.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the body as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Whether the client's cached copy is still valid, i.e. whether a
    /// `304 Not Modified` is warranted. Compares the conditional request
    /// headers against the validators set on `res` so far.
    pub fn fresh(&self, res: &Res) -> bool {
        freshness::is_fresh(
            self.header("If-Modified-Since"),
            self.header("If-None-Match"),
            self.header("Cache-Control"),
            res.headers.get("ETag").and_then(|v| v.first()).map(String::as_str),
            res.headers
                .get("Last-Modified")
                .and_then(|v| v.first())
                .map(String::as_str),
        )
    }

    /// The complement of [`Req::fresh`].
    pub fn stale(&self, res: &Res) -> bool {
        !self.fresh(res)
    }

    /// Negotiate a response media type from `offered` against the `Accept`
    /// header. An absent header accepts the first offered value.
    pub fn accepts<'o>(&self, offered: &[&'o str]) -> Option<&'o str> {
        negotiate::negotiate_media_type(self.header("Accept"), offered)
    }

    /// Negotiate a charset against `Accept-Charset`.
    pub fn accepts_charsets<'o>(&self, offered: &[&'o str]) -> Option<&'o str> {
        negotiate::negotiate_charset(self.header("Accept-Charset"), offered)
    }

    /// Negotiate a content coding against `Accept-Encoding`.
    pub fn accepts_encodings<'o>(&self, offered: &[&'o str]) -> Option<&'o str> {
        negotiate::negotiate_encoding(self.header("Accept-Encoding"), offered)
    }

    /// Negotiate a language tag against `Accept-Language`.
    pub fn accepts_languages<'o>(&self, offered: &[&'o str]) -> Option<&'o str> {
        negotiate::negotiate_language(self.header("Accept-Language"), offered)
    }

    /// The raw `Host` header.
    pub fn host(&self) -> &str {
        self.header("Host")
    }

    /// The validated, lowercased hostname from the `Host` header, or the
    /// empty string when the header is absent or malformed.
    pub fn hostname(&self) -> String {
        let host = self.header("Host");
        if host.is_empty() {
            return String::new();
        }

        if let Some((parsed_host, port)) = split_host_port(host) {
            if port.parse::<i64>().is_err() {
                return String::new();
            }
            return parsed_host.to_string();
        }

        // A bare bracketed IPv6 literal without a port.
        if host.starts_with('[') && host.ends_with(']') {
            return host[1..host.len() - 1].to_string();
        }
        if host.starts_with('[') != host.ends_with(']') {
            return String::new();
        }

        if host.matches(':').count() > 1 {
            return String::new();
        }
        if host.contains(['/', '\\', '@']) {
            return String::new();
        }

        host.trim().to_ascii_lowercase()
    }

    /// Best-effort client address: `X-Forwarded-For` first entry, then
    /// `X-Real-IP`, then the socket's own address. Ports are stripped when
    /// the value parses as host:port.
    pub fn ip(&self) -> String {
        let forwarded = self.header("X-Forwarded-For");
        if !forwarded.is_empty() {
            // Could be a chain: client, proxy1, proxy2.
            let first = forwarded.split(',').next().unwrap_or("").trim();
            return match split_host_port(first) {
                Some((host, _)) => host.to_string(),
                None => first.to_string(),
            };
        }

        let real_ip = self.header("X-Real-IP");
        if !real_ip.is_empty() {
            let trimmed = real_ip.trim();
            return match split_host_port(trimmed) {
                Some((host, _)) => host.to_string(),
                None => trimmed.to_string(),
            };
        }

        match split_host_port(&self.local_address) {
            Some((host, _)) => host.to_string(),
            None => self.local_address.clone(),
        }
    }

    /// First value of the multipart form field `key`, or the empty string
    /// when the request is not multipart or the field is absent.
    pub fn form_value(&self, key: &str) -> String {
        match multipart::parse_multipart(&self.headers, &self.body) {
            Ok(form) => form.value(key).unwrap_or("").to_string(),
            Err(_) => String::new(),
        }
    }

    /// First file part registered under `key` in the multipart form.
    pub fn form_file(&self, key: &str) -> Result<FormFile, Error> {
        let form = multipart::parse_multipart(&self.headers, &self.body)?;
        form.files
            .get(key)
            .and_then(|files| files.first())
            .cloned()
            .ok_or_else(|| Error::FileNotFound(key.to_string()))
    }

    /// Persist a form file under `destination`, creating the directory if
    /// needed.
    pub fn save<P: AsRef<Path>>(&self, file: &FormFile, destination: P) -> Result<(), Error> {
        file.save_to(destination.as_ref())
    }
}

/// Split `host:port` or `[v6]:port`; `None` when the value is not in either
/// form (bare host, bare IPv6, missing port).
fn split_host_port(value: &str) -> Option<(&str, &str)> {
    if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if port.is_empty() {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = value.rsplit_once(':')?;
    if host.contains(':') || port.is_empty() {
        return None;
    }
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req_with_headers(pairs: &[(&str, &str)]) -> Req {
        Req {
            headers: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Req::default()
        }
    }

    #[test]
    fn test_header_lookup_is_case_sensitive() {
        let req = req_with_headers(&[("Content-Type", "application/json")]);
        assert_eq!(req.header("Content-Type"), "application/json");
        assert_eq!(req.header("content-type"), "");
        assert_eq!(req.header_ci("content-type"), "application/json");
        assert_eq!(req.header("unknown"), "");
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:8080"), Some(("example.com", "8080")));
        assert_eq!(split_host_port("[::1]:8080"), Some(("::1", "8080")));
        assert_eq!(split_host_port("example.com"), None);
        assert_eq!(split_host_port("::1"), None);
        assert_eq!(split_host_port("[::1]"), None);
    }

    #[test]
    fn test_hostname_validation() {
        let cases = [
            ("example.com", "example.com"),
            ("EXAMPLE.com", "example.com"),
            ("example.com:8080", "example.com"),
            ("example.com:abc", ""),
            ("[::1]:8080", "::1"),
            ("[::1]", "::1"),
            ("[::1", ""),
            ("a:b:c", ""),
            ("bad/host", ""),
            ("bad\\host", ""),
            ("user@host", ""),
            ("", ""),
        ];

        for (host, want) in cases {
            let req = req_with_headers(&[("Host", host)]);
            assert_eq!(req.hostname(), want, "Host: {host:?}");
        }
    }

    #[test]
    fn test_ip_resolution_order() {
        let req = req_with_headers(&[
            ("X-Forwarded-For", "203.0.113.7:4711, 10.0.0.1"),
            ("X-Real-IP", "198.51.100.2"),
        ]);
        assert_eq!(req.ip(), "203.0.113.7");

        let req = req_with_headers(&[("X-Real-IP", "198.51.100.2:9999")]);
        assert_eq!(req.ip(), "198.51.100.2");

        let mut req = req_with_headers(&[]);
        req.local_address = "127.0.0.1:8080".to_string();
        assert_eq!(req.ip(), "127.0.0.1");

        req.local_address = "not-an-addr".to_string();
        assert_eq!(req.ip(), "not-an-addr");
    }

    #[test]
    fn test_parse_json() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
            age: u32,
        }

        let req = Req {
            body: br#"{"name":"Zkrallah","age":21}"#.to_vec(),
            ..Req::default()
        };
        let user: User = req.parse_json().unwrap();
        assert_eq!(user.name, "Zkrallah");
        assert_eq!(user.age, 21);

        let req = Req {
            body: b"not json".to_vec(),
            ..Req::default()
        };
        assert!(req.parse_json::<User>().is_err());
    }
}
