//! Proactive content negotiation.
//!
//! One parser handles all four `Accept*` request headers: each entry is a
//! token with an optional quality factor, entries are ranked by quality
//! (stable, so wire order breaks ties). The negotiation entry points walk the
//! ranked client list outermost and the server's offered values innermost,
//! returning the first offered value the client accepts.

/// A single parsed `Accept*` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptPart {
    pub token: String,
    pub q: f32,
}

/// Parse an `Accept*` header into entries ranked by quality factor.
///
/// Malformed quality values fall back to 1.0. The sort is stable, so entries
/// with equal quality keep their on-the-wire order.
pub fn parse_accept_header(header: &str) -> Vec<AcceptPart> {
    let mut items: Vec<AcceptPart> = Vec::new();

    for part in header.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut segments = trimmed.split(';');
        let token = segments.next().unwrap_or("").to_string();

        let mut q = 1.0_f32;
        if let Some(param) = segments.next() {
            if let Some(value) = param.strip_prefix("q=") {
                q = value.parse().unwrap_or(1.0);
            }
        }

        items.push(AcceptPart { token, q });
    }

    items.sort_by(|a, b| b.q.partial_cmp(&a.q).unwrap_or(std::cmp::Ordering::Equal));
    items
}

/// Media-range comparison: exact, `type/*`, or `*/*`.
pub fn media_type_matches(client: &str, offered: &str) -> bool {
    if client == offered {
        return true;
    }

    if let Some(client_type) = client.strip_suffix("/*") {
        if client != "*/*" {
            return offered.split('/').next() == Some(client_type);
        }
    }

    client == "*/*"
}

/// `Accept` negotiation over full media types.
pub fn negotiate_media_type<'o>(header: &str, offered: &[&'o str]) -> Option<&'o str> {
    if header.is_empty() || offered.is_empty() {
        return offered.first().copied();
    }

    for client in parse_accept_header(header) {
        for &candidate in offered {
            if media_type_matches(&client.token, candidate) {
                return Some(candidate);
            }
        }
    }

    None
}

/// `Accept-Charset` negotiation. Zero-quality entries are excluded; a `*`
/// entry with positive quality accepts the first offered charset.
pub fn negotiate_charset<'o>(header: &str, offered: &[&'o str]) -> Option<&'o str> {
    if header.is_empty() {
        return offered.first().copied();
    }

    let parts = parse_accept_header(header);

    for part in &parts {
        if part.token == "*" && part.q > 0.0 {
            return offered.first().copied();
        }
    }

    for part in &parts {
        if part.q <= 0.0 {
            continue;
        }
        for &candidate in offered {
            if part.token.eq_ignore_ascii_case(candidate) {
                return Some(candidate);
            }
        }
    }

    None
}

/// `Accept-Encoding` negotiation.
///
/// `identity;q=0` is an explicit refusal of the unencoded form: `identity`
/// can then never be selected, not even through `*`.
pub fn negotiate_encoding<'o>(header: &str, offered: &[&'o str]) -> Option<&'o str> {
    if header.is_empty() {
        return offered.first().copied();
    }

    let parts = parse_accept_header(header);
    let identity_refused = parts.iter().any(|p| p.token == "identity" && p.q == 0.0);

    for part in &parts {
        if part.q <= 0.0 {
            continue;
        }
        for &candidate in offered {
            if part.token.eq_ignore_ascii_case(candidate) {
                return Some(candidate);
            }
        }
    }

    for part in &parts {
        if part.token == "*" && part.q > 0.0 {
            return offered
                .iter()
                .find(|c| !(identity_refused && c.eq_ignore_ascii_case("identity")))
                .copied();
        }
    }

    None
}

/// `Accept-Language` negotiation: exact match first, then a primary-subtag
/// fallback so `en` can satisfy an offered `en-US`.
pub fn negotiate_language<'o>(header: &str, offered: &[&'o str]) -> Option<&'o str> {
    if header.is_empty() {
        return offered.first().copied();
    }

    let parts = parse_accept_header(header);

    for part in &parts {
        if part.token == "*" && part.q > 0.0 {
            return offered.first().copied();
        }
    }

    for part in &parts {
        if part.q <= 0.0 {
            continue;
        }
        for &candidate in offered {
            if part.token.eq_ignore_ascii_case(candidate) {
                return Some(candidate);
            }
        }
    }

    for part in &parts {
        if part.q <= 0.0 {
            continue;
        }
        let primary = part.token.split('-').next().unwrap_or("");
        for &candidate in offered {
            let candidate_primary = candidate.split('-').next().unwrap_or("");
            if primary.eq_ignore_ascii_case(candidate_primary) {
                return Some(candidate);
            }
        }
    }

    None
}
