//! `multipart/form-data` parsing over the buffered request body.
//!
//! Bodies are already in memory by the time a handler runs, so the parser is
//! a plain boundary scanner: no streaming, no temp files. Parsed forms are
//! capped at 32 MiB to bound what a single request can pin in memory.

use crate::error::Error;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Memory cap for a parsed form, including file parts.
pub const MAX_FORM_MEMORY: usize = 32 << 20;

/// One file part extracted from a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFile {
    pub filename: String,
    pub content: Vec<u8>,
    /// The part's original MIME header block.
    pub header: HashMap<String, String>,
}

impl FormFile {
    /// Write the file into `destination`, creating the directory first.
    ///
    /// Directories are created 0755, files 0600.
    pub fn save_to(&self, destination: &Path) -> Result<(), Error> {
        let full_path = destination.join(&self.filename);

        let mut dirs = fs::DirBuilder::new();
        dirs.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            dirs.mode(0o755);
        }
        dirs.create(destination)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&full_path).map_err(Error::Save)?;
        file.write_all(&self.content).map_err(Error::Save)?;
        Ok(())
    }
}

/// A fully parsed multipart form: text fields and file parts, keyed by the
/// `name` parameter of each part's `Content-Disposition`.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub values: HashMap<String, Vec<String>>,
    pub files: HashMap<String, Vec<FormFile>>,
}

impl MultipartForm {
    /// First text value registered under `key`, if any.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key)?.first().map(String::as_str)
    }

    /// First file part registered under `key`, if any.
    pub fn file(&self, key: &str) -> Option<&FormFile> {
        self.files.get(key)?.first()
    }
}

/// Split a `Content-Type`-style value into a lowercased media type and its
/// parameters. Parameter values may be double-quoted.
pub fn parse_media_type(value: &str) -> Option<(String, HashMap<String, String>)> {
    let mut segments = value.split(';');
    let media = segments.next()?.trim().to_ascii_lowercase();
    if media.is_empty() {
        return None;
    }

    let mut params = HashMap::new();
    for segment in segments {
        if let Some((key, val)) = segment.trim().split_once('=') {
            params.insert(
                key.trim().to_ascii_lowercase(),
                val.trim().trim_matches('"').to_string(),
            );
        }
    }

    Some((media, params))
}

/// Parse the request body as a multipart form.
///
/// Requires a `Content-Type` of `multipart/*` with a `boundary` parameter;
/// anything else is `Error::NotMultipart`. A structurally broken body
/// (missing boundary marker, unterminated part, header block without the
/// blank separator line) is `Error::Multipart`.
pub fn parse_multipart(
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Result<MultipartForm, Error> {
    let content_type = headers
        .get("Content-Type")
        .map(String::as_str)
        .unwrap_or("");
    if content_type.is_empty() {
        return Err(Error::NotMultipart);
    }

    let (media, params) = parse_media_type(content_type).ok_or(Error::NotMultipart)?;
    if !media.starts_with("multipart/") {
        return Err(Error::NotMultipart);
    }

    let boundary = match params.get("boundary") {
        Some(b) if !b.is_empty() => b.as_str(),
        _ => {
            tracing::debug!("no boundary parameter in Content-Type");
            return Err(Error::NotMultipart);
        }
    };

    if body.len() > MAX_FORM_MEMORY {
        return Err(Error::Multipart(format!(
            "form data exceeds {MAX_FORM_MEMORY} byte memory limit"
        )));
    }

    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut form = MultipartForm::default();
    let mut pos =
        find(body, delimiter, 0).ok_or_else(|| Error::Multipart("boundary not found".into()))?;

    loop {
        let after = pos + delimiter.len();
        let rest = &body[after..];

        if rest.starts_with(b"--") {
            // Closing delimiter.
            return Ok(form);
        }

        let content_start = if rest.starts_with(b"\r\n") {
            after + 2
        } else if rest.starts_with(b"\n") {
            after + 1
        } else {
            return Err(Error::Multipart("malformed boundary line".into()));
        };

        let next = find(body, delimiter, content_start)
            .ok_or_else(|| Error::Multipart("unterminated part".into()))?;

        let mut part = &body[content_start..next];
        if part.ends_with(b"\r\n") {
            part = &part[..part.len() - 2];
        } else if part.ends_with(b"\n") {
            part = &part[..part.len() - 1];
        }

        parse_part(part, &mut form)?;
        pos = next;
    }
}

/// Parse one part: MIME header block, blank line, content.
fn parse_part(part: &[u8], form: &mut MultipartForm) -> Result<(), Error> {
    let header_end = find(part, b"\r\n\r\n", 0)
        .map(|i| (i, i + 4))
        .or_else(|| find(part, b"\n\n", 0).map(|i| (i, i + 2)))
        .ok_or_else(|| Error::Multipart("part without header block".into()))?;

    let header_block = String::from_utf8_lossy(&part[..header_end.0]).into_owned();
    let content = &part[header_end.1..];

    let mut headers = HashMap::new();
    for line in header_block.lines() {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let disposition = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Content-Disposition"))
        .map(|(_, v)| v.as_str())
        .unwrap_or("");
    let (_, params) = match parse_media_type(disposition) {
        Some(parsed) => parsed,
        None => return Ok(()), // part without a disposition carries no form data
    };

    let name = match params.get("name") {
        Some(name) if !name.is_empty() => name.clone(),
        _ => return Ok(()),
    };

    if let Some(filename) = params.get("filename") {
        form.files.entry(name).or_default().push(FormFile {
            filename: filename.clone(),
            content: content.to_vec(),
            header: headers,
        });
    } else {
        form.values
            .entry(name)
            .or_default()
            .push(String::from_utf8_lossy(content).into_owned());
    }

    Ok(())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_body(boundary: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"test\"\r\n\r\nvalue\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );
        body
    }

    #[test]
    fn test_parse_media_type() {
        let (media, params) = parse_media_type("multipart/form-data; boundary=abc123").unwrap();
        assert_eq!(media, "multipart/form-data");
        assert_eq!(params.get("boundary").map(String::as_str), Some("abc123"));

        let (media, params) =
            parse_media_type("Multipart/Form-Data; boundary=\"quoted\"").unwrap();
        assert_eq!(media, "multipart/form-data");
        assert_eq!(params.get("boundary").map(String::as_str), Some("quoted"));
    }

    #[test]
    fn test_parse_simple_form() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "multipart/form-data; boundary=abc123".to_string(),
        );

        let form = parse_multipart(&headers, &form_body("abc123")).unwrap();
        assert_eq!(form.value("test"), Some("value"));
        assert_eq!(form.value("missing"), None);
    }

    #[test]
    fn test_missing_boundary_is_not_multipart() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "multipart/form-data".to_string(),
        );
        assert!(matches!(
            parse_multipart(&headers, &form_body("abc123")),
            Err(Error::NotMultipart)
        ));
    }

    #[test]
    fn test_non_multipart_content() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        assert!(matches!(
            parse_multipart(&headers, b"{}"),
            Err(Error::NotMultipart)
        ));
    }

    #[test]
    fn test_malformed_body() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "multipart/form-data; boundary=abc123".to_string(),
        );
        assert!(matches!(
            parse_multipart(&headers, b"invalid multipart data"),
            Err(Error::Multipart(_))
        ));
    }

    #[test]
    fn test_unterminated_part() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "multipart/form-data; boundary=abc123".to_string(),
        );
        let body = b"--abc123\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nx";
        assert!(matches!(
            parse_multipart(&headers, body),
            Err(Error::Multipart(_))
        ));
    }
}
