//! HTTP date parsing and formatting.
//!
//! RFC 9110 obliges servers to accept three date layouts: the preferred
//! IMF-fixdate, the obsolete RFC 850 form, and ANSI C `asctime`. Parsing
//! tries them in that order; formatting always emits IMF-fixdate.

use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parse an HTTP date header value.
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    for layout in [IMF_FIXDATE, RFC_850, ASCTIME] {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(t.and_utc());
        }
    }
    None
}

/// Format a timestamp as an IMF-fixdate, suitable for `Last-Modified`.
pub fn format(t: DateTime<Utc>) -> String {
    t.format(IMF_FIXDATE).to_string()
}
