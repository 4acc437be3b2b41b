//! The response half of a handler invocation.
//!
//! `Res` holds a write handle to the socket and serializes a complete
//! response on every `send`/`json`/`end` call. Response headers are a
//! name → ordered-values map: `Set-Cookie` and custom duplicates rely on the
//! list semantics, while `Vary` collapses to a single comma-joined value.
//!
//! Note that the serializer always writes the computed `Content-Type` line;
//! a handler that also sets `Content-Type` through [`Res::header`] gets a
//! second, duplicate line. Use [`Res::set_type`] to change the computed one.

use crate::httpdate;
use crate::mime;
use crate::request::Req;
use crate::server::wire;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, warn};

/// `SameSite` cookie attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    /// Parse a `SameSite` attribute value. Anything but the three defined
    /// values is dropped with a warning.
    pub fn parse(value: &str) -> Option<SameSite> {
        match value {
            "Strict" => Some(SameSite::Strict),
            "Lax" => Some(SameSite::Lax),
            "None" => Some(SameSite::None),
            other => {
                warn!(value = other, "invalid SameSite value, dropping attribute");
                None
            }
        }
    }
}

/// An outgoing cookie.
#[derive(Debug, Clone, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub session_only: bool,
}

impl Cookie {
    /// Serialize into a `Set-Cookie` header value.
    fn serialize(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);

        if !self.path.is_empty() {
            out.push_str(&format!("; Path={}", self.path));
        }
        if !self.domain.is_empty() {
            out.push_str(&format!("; Domain={}", self.domain));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!(
                "; Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S UTC")
            ));
        }
        if self.max_age > 0 {
            out.push_str(&format!("; Max-Age={}", self.max_age));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            out.push_str(&format!("; SameSite={}", same_site.as_str()));
        }
        if self.session_only {
            out.push_str("; SessionOnly=true");
        }

        out
    }
}

/// An in-flight HTTP response.
pub struct Res {
    socket: Box<dyn Write + Send>,
    pub status_code: u16,
    /// Extra headers: name → ordered list of values.
    pub headers: HashMap<String, Vec<String>>,
    /// Computed content type; set late, overrides any earlier value.
    pub content_type: String,
    pub pretty_print_json: bool,
}

impl Res {
    pub fn new(socket: Box<dyn Write + Send>, pretty_print_json: bool) -> Self {
        Res {
            socket,
            status_code: 200,
            headers: HashMap::new(),
            content_type: String::new(),
            pretty_print_json,
        }
    }

    /// Set the status code. Chainable.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self
    }

    /// Append a header value. Chainable; repeated names accumulate.
    pub fn header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Set the content type from a file extension (with or without the dot)
    /// or a full media type. Chainable.
    pub fn set_type(&mut self, ext_or_mime: &str) -> &mut Self {
        self.content_type = if ext_or_mime.contains('/') {
            ext_or_mime.to_string()
        } else {
            let looked_up = mime::by_extension(ext_or_mime.trim_start_matches('.'));
            if looked_up.is_empty() {
                "application/octet-stream".to_string()
            } else {
                looked_up.to_string()
            }
        };
        self
    }

    /// Merge field names into the `Vary` header, canonicalizing
    /// capitalization and dropping case-insensitive duplicates. The header
    /// keeps a single comma-joined value.
    pub fn vary(&mut self, fields: &[&str]) {
        if fields.is_empty() {
            return;
        }

        if !self.headers.contains_key("Vary") {
            self.header("Vary", "");
        }
        let current = self.headers["Vary"][0].clone();
        let current_fields: Vec<String> =
            current.split(", ").map(canonical_header_key).collect();

        let mut fresh: Vec<String> = Vec::new();
        for field in fields {
            let canonical = canonical_header_key(field);
            if !current_fields.contains(&canonical) && !fresh.contains(&canonical) {
                fresh.push(canonical);
            }
        }

        let joined = fresh.join(", ");
        let slot = &mut self.headers.get_mut("Vary").expect("Vary header exists")[0];
        if current.is_empty() {
            *slot = joined;
        } else if !joined.is_empty() {
            *slot = format!("{current}, {joined}");
        }
    }

    /// Queue a `Set-Cookie` header. Chainable.
    pub fn set_cookie(&mut self, cookie: Cookie) -> &mut Self {
        let serialized = cookie.serialize();
        self.header("Set-Cookie", &serialized);
        self
    }

    /// Expire the named cookies on the client.
    pub fn clear_cookie(&mut self, keys: &[&str]) {
        for key in keys {
            let cleared =
                format!("{key}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 UTC; Max-Age=0");
            self.header("Set-Cookie", &cleared);
        }
    }

    /// Expire every cookie the request carried.
    pub fn clear_all_cookies(&mut self, req: &Req) {
        let keys: Vec<&str> = req.cookies.keys().map(String::as_str).collect();
        self.clear_cookie(&keys);
    }

    /// Send a text response. The content type defaults to
    /// `text/plain; charset=utf-8` unless one was set earlier.
    pub fn send(&mut self, data: &str) {
        self.send_bytes(data.as_bytes());
    }

    /// Send a raw byte response under the current content type (defaulting
    /// like [`Res::send`]).
    pub fn send_bytes(&mut self, data: &[u8]) {
        if self.content_type.is_empty() {
            self.content_type = "text/plain; charset=utf-8".to_string();
        }
        wire::send_response(
            &mut self.socket,
            data,
            self.status_code,
            &self.content_type,
            Some(&self.headers),
        );
    }

    /// Serialize `data` as JSON and send it. Respects the app's
    /// pretty-print flag. A serialization failure degrades to a 500.
    pub fn json<T: Serialize>(&mut self, data: &T) {
        let raw = if self.pretty_print_json {
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            match data.serialize(&mut serializer) {
                Ok(()) => Ok(buf),
                Err(e) => Err(e),
            }
        } else {
            serde_json::to_vec(data)
        };

        match raw {
            Ok(raw) => {
                self.content_type = "application/json".to_string();
                wire::send_response(
                    &mut self.socket,
                    &raw,
                    self.status_code,
                    &self.content_type,
                    Some(&self.headers),
                );
            }
            Err(e) => {
                error!(error = %e, "error serializing json response");
                self.status_code = 500;
                self.send("Internal Server Error: JSON Marshal Failed");
            }
        }
    }

    /// End the response with an empty body.
    pub fn end(&mut self) {
        self.send("");
    }

    /// Serve a file from `root`.
    ///
    /// Directories fall back to their `index.html` (403 when absent). The
    /// content type comes from the file extension. `Last-Modified` is
    /// stamped from the file's mtime, and a request `If-Modified-Since` at
    /// or after it (one-second granularity) yields a 304 with no body.
    pub fn static_file(&mut self, req: &Req, path: &str, root: &str) {
        let path = if path.is_empty() { "/" } else { path };

        // Keep requests inside the root.
        if path.contains("..") {
            self.status(404).send("Not Found");
            return;
        }

        let mut full_path = PathBuf::from(root).join(path.trim_start_matches('/'));
        let metadata = match fs::metadata(&full_path) {
            Ok(metadata) => metadata,
            Err(_) => {
                self.status(404).send("Not Found");
                return;
            }
        };

        let metadata = if metadata.is_dir() {
            let index = full_path.join("index.html");
            match fs::metadata(&index) {
                Ok(index_meta) => {
                    full_path = index;
                    index_meta
                }
                Err(_) => {
                    self.status(403)
                        .send("Couldn't find index.html in given directory");
                    return;
                }
            }
        } else {
            metadata
        };

        self.content_type = mime::for_path(&full_path).to_string();
        let content_type = self.content_type.clone();
        self.header("Content-Type", &content_type);

        if let Ok(modified) = metadata.modified() {
            let mod_time: DateTime<Utc> = modified.into();
            let last_modified = httpdate::format(mod_time);
            self.header("Last-Modified", &last_modified);

            let if_modified_since = req.header("If-Modified-Since");
            if !if_modified_since.is_empty() {
                if let Some(since) = httpdate::parse(if_modified_since) {
                    if mod_time < since + chrono::Duration::seconds(1) {
                        self.status(304).send("");
                        return;
                    }
                }
            }
        }

        match fs::read(&full_path) {
            Ok(content) => self.send_bytes(&content),
            Err(_) => {
                self.status(500).send("Internal Server Error");
            }
        }
    }
}

/// Canonical header capitalization: first letter and every letter following
/// a hyphen uppercased, the rest lowercased.
fn canonical_header_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}
