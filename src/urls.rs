//! URL helpers: request target composition, charset sniffing and link joining

use once_cell::sync::Lazy;
use regex::Regex;
use url::form_urlencoded;
use url::Url;

static CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*charset\s*=\s*"?([^";\s]+)"?"#).expect("charset regex")
});

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("scheme regex"));

/// Build the `path[?query]` request target for `url`, appending `params`
/// after any query the URL already carries.
pub fn compose_path<K, V>(url: &Url, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut target = url.path().to_string();
    let mut parts = Vec::new();

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        parts.push(query.to_string());
    }
    if !params.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        parts.push(encoded);
    }
    if !parts.is_empty() {
        target.push('?');
        target.push_str(&parts.join("&"));
    }
    target
}

/// Extract the `charset` parameter from a Content-Type value.
pub fn extract_charset(content_type: Option<&str>) -> Option<String> {
    let content_type = content_type?;
    CHARSET_RE
        .captures(content_type)
        .map(|cap| cap[1].to_string())
}

/// Join `relative` onto `base`.
///
/// Scheme and authority come from `relative` when present, otherwise from
/// `base`. A relative path that does not start with `/` is appended to the
/// base path with a single `/` separator. No dot-segment normalization is
/// done; params, query and fragment are taken from `relative` only.
pub fn resolve_absolute_url(relative: &str, base: &str) -> String {
    let rel = UrlParts::split(relative);
    let base = UrlParts::split(base);

    let path = if rel.path.starts_with('/') {
        rel.path.clone()
    } else {
        format!("{}/{}", base.path, rel.path)
    };

    UrlParts {
        scheme: if rel.scheme.is_empty() { base.scheme } else { rel.scheme.clone() },
        authority: if rel.authority.is_empty() { base.authority } else { rel.authority.clone() },
        path,
        params: rel.params,
        query: rel.query,
        fragment: rel.fragment,
    }
    .to_string()
}

/// Component split of a possibly-relative URL reference.
#[derive(Debug, Default, Clone, PartialEq)]
struct UrlParts {
    scheme: String,
    authority: String,
    path: String,
    params: String,
    query: String,
    fragment: String,
}

impl UrlParts {
    fn split(input: &str) -> Self {
        let mut parts = UrlParts::default();
        let mut rest = input;

        if let Some(cap) = SCHEME_RE.captures(rest) {
            parts.scheme = cap[1].to_ascii_lowercase();
            rest = &rest[cap[0].len()..];
        }

        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find(['/', '?', '#']).unwrap_or(after.len());
            parts.authority = after[..end].to_string();
            rest = &after[end..];
        }

        if let Some(idx) = rest.find('#') {
            parts.fragment = rest[idx + 1..].to_string();
            rest = &rest[..idx];
        }
        if let Some(idx) = rest.find('?') {
            parts.query = rest[idx + 1..].to_string();
            rest = &rest[..idx];
        }

        // `;params` only attach to the last path segment
        let last_segment = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        if let Some(idx) = rest[last_segment..].find(';') {
            let idx = last_segment + idx;
            parts.params = rest[idx + 1..].to_string();
            rest = &rest[..idx];
        }

        parts.path = rest.to_string();
        parts
    }
}

impl std::fmt::Display for UrlParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if !self.authority.is_empty() || !self.scheme.is_empty() {
            f.write_str("//")?;
            f.write_str(&self.authority)?;
            if !self.path.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
        }
        f.write_str(&self.path)?;
        if !self.params.is_empty() {
            write!(f, ";{}", self.params)?;
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}
