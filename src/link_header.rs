//! RFC 5988 `Link` header parsing

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*<([^>]+)>;\s*rel\s*="([^"]+)""#).expect("link regex"));

/// Relation name to target URL, as found in one `Link` header.
pub type LinkTable = HashMap<String, String>;

/// Parse a `Link` header value into a relation table.
///
/// Every comma-separated segment must look like `<URL>; rel="RELATION"`;
/// anything after the relation is ignored. If a relation appears twice the
/// last one wins. An absent or blank header gives an empty table.
pub fn parse_link_header(header: Option<&str>) -> Result<LinkTable> {
    let mut links = LinkTable::new();
    let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
        return Ok(links);
    };

    for segment in split_segments(header) {
        let cap = LINK_RE
            .captures(segment)
            .ok_or_else(|| Error::MalformedHeader(segment.trim().to_string()))?;
        links.insert(cap[2].to_string(), cap[1].to_string());
    }

    Ok(links)
}

/// Split on commas that are outside `<...>` and outside quoted strings.
fn split_segments(header: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_target = false;
    let mut in_quotes = false;

    for (i, c) in header.char_indices() {
        match c {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            ',' if !in_target && !in_quotes => {
                segments.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&header[start..]);
    segments
}
