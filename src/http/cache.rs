//! Conditional GET support for single-image responses
//!
//! Stored images can be overwritten in place (two uploads in the same
//! second share a name), so the entity tag is derived from the bytes rather
//! than from file metadata.

use chrono::{DateTime, Utc};
use std::hash::{DefaultHasher, Hasher};
use std::time::SystemTime;

/// `Last-Modified` / `Date` layout from RFC 9110
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Validators sent with an image and compared against `If-None-Match`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: String,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn for_content(data: &[u8], modified: Option<SystemTime>) -> Self {
        let mut hasher = DefaultHasher::new();
        hasher.write(data);
        Self {
            etag: format!("\"{:x}-{:x}\"", data.len(), hasher.finish()),
            last_modified: modified.map(http_date),
        }
    }

    /// Weak comparison against an `If-None-Match` header value
    ///
    /// A list of tags and the `*` wildcard are both accepted.
    pub fn not_modified(&self, if_none_match: Option<&str>) -> bool {
        let Some(header) = if_none_match else {
            return false;
        };
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.trim_start_matches("W/") == self.etag
        })
    }
}

/// Format a timestamp as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(IMF_FIXDATE).to_string()
}
