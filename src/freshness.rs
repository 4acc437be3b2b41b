//! Conditional-request freshness evaluation.
//!
//! Decides whether a cached client copy is still valid, i.e. whether the
//! handler can answer `304 Not Modified`. `If-None-Match` takes precedence
//! over `If-Modified-Since`; a `Cache-Control: no-cache` directive on the
//! request short-circuits both.

use crate::httpdate;
use tracing::debug;

/// Evaluate request freshness against the response's validator headers.
///
/// `modified_since`, `none_match` and `cache_control` come from the request;
/// `res_etag` and `res_last_modified` are what the handler has stamped onto
/// the response so far.
pub fn is_fresh(
    modified_since: &str,
    none_match: &str,
    cache_control: &str,
    res_etag: Option<&str>,
    res_last_modified: Option<&str>,
) -> bool {
    let mut etag_matched = true;
    let mut modified_since_matched = true;
    let mut etag_missing = false;

    if modified_since.is_empty() && none_match.is_empty() {
        debug!("request is unconditional");
        return false;
    }

    if !cache_control.is_empty() && has_no_cache_directive(cache_control) {
        debug!("request carries a Cache-Control no-cache directive");
        return false;
    }

    if !none_match.is_empty() && none_match != "*" {
        match res_etag.filter(|v| !v.is_empty()) {
            Some(etag) => {
                if etag_is_stale(etag, none_match) {
                    debug!(etag, "ETag did not match If-None-Match");
                    etag_matched = false;
                }
            }
            None => {
                debug!("no ETag response header to compare against");
                etag_matched = false;
            }
        }
    } else {
        etag_matched = false;
        etag_missing = true;
    }

    if !modified_since.is_empty() {
        match res_last_modified.filter(|v| !v.is_empty()) {
            Some(last_modified) => {
                match (httpdate::parse(last_modified), httpdate::parse(modified_since)) {
                    (Some(lm), Some(ims)) => {
                        // Fresh iff the resource was not modified strictly
                        // after the client's snapshot.
                        if lm > ims {
                            debug!("resource modified since client snapshot");
                            modified_since_matched = false;
                        }
                    }
                    _ => {
                        debug!("unparseable validator date");
                        modified_since_matched = false;
                    }
                }
            }
            None => {
                debug!("no Last-Modified response header to compare against");
                modified_since_matched = false;
            }
        }
    }

    etag_matched || (etag_missing && modified_since_matched)
}

/// Check whether a `Cache-Control` value contains a `no-cache` directive.
///
/// Directive boundaries are start/end of string, space, or comma; anything
/// else (e.g. `xno-cache`, `no-cachex`, `no-cache=`) does not count.
pub fn has_no_cache_directive(cache_control: &str) -> bool {
    const DIRECTIVE: &str = "no-cache";

    let pos = match cache_control.find(DIRECTIVE) {
        Some(pos) => pos,
        None => return false,
    };

    if pos > 0 {
        let prev = cache_control.as_bytes()[pos - 1];
        if prev != b' ' && prev != b',' {
            return false;
        }
    }

    let end = pos + DIRECTIVE.len();
    if end == cache_control.len() {
        return true;
    }

    let next = cache_control.as_bytes()[end];
    next == b',' || next == b' '
}

/// Entity-tag comparison per RFC 7232 weak rules: `W/"x"` matches `"x"` in
/// either direction.
pub fn compare_etags(client_tag: &str, server_tag: &str) -> bool {
    if client_tag == server_tag {
        return true;
    }

    if let Some(opaque) = client_tag.strip_prefix("W/") {
        return opaque == server_tag || format!("W/{server_tag}") == client_tag;
    }
    if let Some(opaque) = server_tag.strip_prefix("W/") {
        return opaque == client_tag || format!("W/{client_tag}") == server_tag;
    }

    false
}

/// Scan a comma-separated `If-None-Match` list for an entry matching `etag`.
///
/// Returns true when nothing matches (the client's copy is stale). Leading
/// spaces after commas are skipped without allocating.
pub fn etag_is_stale(etag: &str, none_match: &str) -> bool {
    let bytes = none_match.as_bytes();
    let mut start = 0usize;
    let mut end = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b' ' => {
                if start == end {
                    start = i + 1;
                    end = i + 1;
                }
            }
            b',' => {
                if compare_etags(&none_match[start..end], etag) {
                    return false;
                }
                start = i + 1;
                end = i + 1;
            }
            _ => end = i + 1,
        }
    }

    !compare_etags(&none_match[start..end], etag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_etags() {
        assert!(compare_etags("\"abc\"", "\"abc\""));
        assert!(compare_etags("W/\"abc\"", "\"abc\""));
        assert!(compare_etags("\"abc\"", "W/\"abc\""));
        assert!(compare_etags("W/\"abc\"", "W/\"abc\""));
        assert!(!compare_etags("\"abc\"", "\"xyz\""));
    }

    #[test]
    fn test_etag_list_scanning() {
        assert!(!etag_is_stale("\"xyz\"", "\"abc\", \"xyz\""));
        assert!(etag_is_stale("\"123\"", "\"abc\", \"xyz\""));
        assert!(etag_is_stale("\"abc\"", ""));
    }

    #[test]
    fn test_no_cache_boundaries() {
        assert!(has_no_cache_directive("no-cache"));
        assert!(has_no_cache_directive(" no-cache "));
        assert!(has_no_cache_directive("public, no-cache"));
        assert!(has_no_cache_directive("no-cache, must-revalidate"));

        assert!(!has_no_cache_directive("nocache"));
        assert!(!has_no_cache_directive("no-cachex"));
        assert!(!has_no_cache_directive("xno-cache"));
        assert!(!has_no_cache_directive("no--cache"));
        assert!(!has_no_cache_directive("no-cache="));
        assert!(!has_no_cache_directive("NO-CACHE"));
        assert!(!has_no_cache_directive(""));
    }
}
