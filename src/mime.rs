//! Media-type lookup by file extension.
//!
//! This is the whole of the MIME collaborator the response helpers talk to.
//! The table covers what the bundled helpers actually serve; everything else
//! falls back to `application/octet-stream`.

use std::path::Path;

/// Map a file extension (without the dot) to a media type.
///
/// Returns an empty string for unknown extensions so callers can pick their
/// own fallback.
pub fn by_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "text" => "text/plain",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "",
    }
}

/// Media type for a filesystem path, falling back to `application/octet-stream`.
pub fn for_path(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let mime = by_extension(ext);
    if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    }
}
