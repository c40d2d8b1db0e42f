//! Fetched resource representations
//!
//! A response becomes either a [`Generic`] representation (opaque body,
//! links from the `Link` header only) or a [`Structured`] one (XML body
//! parsed up front, links also searched in the document). The choice is
//! made once, from the Content-Type.

use crate::error::{Error, Result};
use crate::link_header::{parse_link_header, LinkTable};
use crate::query::{Match, Query};
use crate::transport::{header_value, Body, Response};
use crate::urls::extract_charset;
use crate::xml::{declared_encoding, decode_bytes, Document, Namespaces, NodeId, DOCUMENT};

/// Mime types whose bodies are parsed as XML.
pub const STRUCTURED_TYPES: [&str; 3] = ["application/xml", "application/atom+xml", "text/xml"];

/// Parsed Content-Type header.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    pub mime: String,
    pub params: Vec<(String, String)>,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(';');
        let mime = parts.next().unwrap_or_default().trim().to_string();
        let params = parts
            .filter_map(|p| {
                let (k, v) = p.split_once('=')?;
                Some((
                    k.trim().to_ascii_lowercase(),
                    v.trim().trim_matches('"').to_string(),
                ))
            })
            .collect();
        Self { mime, params }
    }

    /// Whether the mime type (parameters stripped, case-sensitive) is one
    /// of [`STRUCTURED_TYPES`].
    pub fn is_structured(&self) -> bool {
        STRUCTURED_TYPES.contains(&self.mime.as_str())
    }
}

/// Status, headers and everything derived from them.
#[derive(Debug)]
pub struct Head {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<ContentType>,
    pub charset: Option<String>,
    pub links: LinkTable,
}

/// Body readable once; links come from the `Link` header only.
#[derive(Debug)]
pub struct Generic {
    head: Head,
    body: Option<Body>,
}

/// XML body parsed at construction.
#[derive(Debug)]
pub struct Structured {
    head: Head,
    raw: Vec<u8>,
    document: Document,
    namespaces: Namespaces,
}

#[derive(Debug)]
pub enum Representation {
    Generic(Generic),
    Structured(Structured),
}

impl Representation {
    /// Build the representation for `response`.
    ///
    /// Fails on a malformed `Link` header, and for structured content types
    /// on a body that is not well-formed XML. The structured variant reads
    /// the whole body here.
    pub async fn from_response(response: Response, namespaces: Namespaces) -> Result<Self> {
        let Response {
            status,
            headers,
            body,
        } = response;

        let raw_type = header_value(&headers, "Content-Type");
        let content_type = raw_type.as_deref().map(ContentType::parse);
        let charset = extract_charset(raw_type.as_deref());
        let links = parse_link_header(header_value(&headers, "Link").as_deref())?;
        tracing::trace!(?links, "link header");

        let mut head = Head {
            status,
            headers,
            content_type,
            charset,
            links,
        };

        let structured = head
            .content_type
            .as_ref()
            .is_some_and(ContentType::is_structured);
        if !structured {
            tracing::debug!(content_type = ?raw_type, "generic representation");
            return Ok(Representation::Generic(Generic {
                head,
                body: Some(body),
            }));
        }

        let raw = body.read(None).await?;
        if head.charset.is_none() {
            head.charset = declared_encoding(&raw);
        }
        let document = Document::parse(&raw, head.charset.as_deref())?;
        tracing::debug!(
            content_type = ?raw_type,
            nodes = document.len() - 1,
            "structured representation"
        );

        Ok(Representation::Structured(Structured {
            head,
            raw,
            document,
            namespaces,
        }))
    }

    pub fn head(&self) -> &Head {
        match self {
            Representation::Generic(g) => &g.head,
            Representation::Structured(s) => &s.head,
        }
    }

    pub fn status(&self) -> u16 {
        self.head().status
    }

    pub fn header(&self, name: &str) -> Option<String> {
        header_value(&self.head().headers, name)
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.head().content_type.as_ref()
    }

    /// Charset sniffed from the Content-Type (or, for XML, the prolog).
    pub fn charset(&self) -> Option<&str> {
        self.head().charset.as_deref()
    }

    pub fn links(&self) -> &LinkTable {
        &self.head().links
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Representation::Structured(_))
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Representation::Generic(_) => None,
            Representation::Structured(s) => Some(&s.document),
        }
    }

    /// Decode up to `max_bytes` of the body as text.
    ///
    /// Uses the sniffed charset, UTF-8 otherwise. A generic body can only be
    /// decoded once; a structured body was buffered and can be decoded again.
    pub async fn decode(&mut self, max_bytes: Option<usize>) -> Result<String> {
        match self {
            Representation::Generic(g) => {
                let body = g.body.take().ok_or(Error::BodyConsumed)?;
                let bytes = body.read(max_bytes).await?;
                Ok(decode_bytes(&bytes, g.head.charset.as_deref()))
            }
            Representation::Structured(s) => {
                let end = max_bytes.map_or(s.raw.len(), |max| max.min(s.raw.len()));
                Ok(decode_bytes(&s.raw[..end], s.head.charset.as_deref()))
            }
        }
    }

    /// Find the target of `relation`.
    ///
    /// The `Link` header is tried first. On a miss, a structured body is
    /// searched for `<link rel="relation" href="...">` elements (any
    /// namespace) inside the elements selected by `filter`, or the whole
    /// document without one. The first match wins.
    pub fn resolve_link(&self, relation: &str, filter: Option<&str>) -> Result<String> {
        if let Some(target) = self.links().get(relation) {
            tracing::debug!(relation, href = %target, "relation found in Link header");
            return Ok(target.clone());
        }

        match self {
            Representation::Generic(_) => Err(Error::RelationNotFound(relation.to_string())),
            Representation::Structured(s) => s.find_link(relation, filter),
        }
    }

    /// Evaluate a query over a structured body with the endpoint's
    /// namespace bindings, returning the string value of each match.
    pub fn query(&self, expr: &str) -> Result<Vec<String>> {
        match self {
            Representation::Generic(g) => Err(Error::NotStructured(
                g.head
                    .content_type
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |ct| ct.mime.clone()),
            )),
            Representation::Structured(s) => Ok(s
                .document
                .query(expr, &s.namespaces)?
                .iter()
                .map(|m| m.value(&s.document))
                .collect()),
        }
    }
}

impl Structured {
    fn find_link(&self, relation: &str, filter: Option<&str>) -> Result<String> {
        let scopes: Vec<NodeId> = match filter {
            Some(expr) => self
                .document
                .query(expr, &self.namespaces)?
                .into_iter()
                .filter_map(|m| match m {
                    Match::Element(n) => Some(n),
                    _ => None,
                })
                .collect(),
            None => vec![DOCUMENT],
        };

        let query = Query::link_href(relation);
        for scope in scopes {
            if let Some(found) = query
                .evaluate(&self.document, scope, &self.namespaces)?
                .first()
            {
                let target = found.value(&self.document);
                tracing::debug!(relation, href = %target, ?filter, "relation found in body");
                return Ok(target);
            }
        }

        Err(Error::RelationNotFound(relation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &[(&str, &str)], body: &'static [u8]) -> Response {
        Response::new(
            200,
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Body::from_bytes(body),
        )
    }

    async fn build(headers: &[(&str, &str)], body: &'static [u8]) -> Result<Representation> {
        Representation::from_response(response(headers, body), Namespaces::new()).await
    }

    const FEED: &[u8] = br#"<feed xmlns="http://www.w3.org/2005/Atom">
  <link rel="self" href="/feed"/>
  <entry><link rel="next" href="/entry/next"/></entry>
  <link rel="next" href="/feed/next"/>
</feed>"#;

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("application/atom+xml; charset=\"utf-8\"; type=feed");
        assert_eq!(ct.mime, "application/atom+xml");
        assert_eq!(
            ct.params,
            vec![
                ("charset".to_string(), "utf-8".to_string()),
                ("type".to_string(), "feed".to_string())
            ]
        );
        assert!(ct.is_structured());
        assert!(!ContentType::parse("Application/XML").is_structured());
        assert!(!ContentType::parse("application/json").is_structured());
    }

    #[tokio::test]
    async fn test_factory_selects_variant() {
        let rep = build(&[("Content-Type", "application/atom+xml")], FEED).await.unwrap();
        assert!(rep.is_structured());

        let rep = build(&[("Content-Type", "text/xml; charset=utf-8")], b"<r/>")
            .await
            .unwrap();
        assert!(rep.is_structured());

        let rep = build(&[("Content-Type", "application/json")], b"{}").await.unwrap();
        assert!(!rep.is_structured());

        let rep = build(&[], b"<r/>").await.unwrap();
        assert!(!rep.is_structured());
        assert!(rep.document().is_none());
    }

    #[tokio::test]
    async fn test_header_lookup_wins_over_body() {
        let rep = build(
            &[
                ("Content-Type", "application/atom+xml"),
                ("Link", "</from-header>; rel=\"next\""),
            ],
            FEED,
        )
        .await
        .unwrap();
        assert_eq!(rep.resolve_link("next", None).unwrap(), "/from-header");
    }

    #[tokio::test]
    async fn test_body_fallback_document_order() {
        let rep = build(&[("Content-Type", "application/atom+xml")], FEED).await.unwrap();
        assert_eq!(rep.resolve_link("self", None).unwrap(), "/feed");
        assert_eq!(rep.resolve_link("next", None).unwrap(), "/entry/next");
    }

    #[tokio::test]
    async fn test_body_fallback_with_filter() {
        let mut rep = build(&[("Content-Type", "application/atom+xml")], FEED).await.unwrap();
        if let Representation::Structured(s) = &mut rep {
            s.namespaces
                .insert("atom".into(), "http://www.w3.org/2005/Atom".into());
        }
        assert_eq!(
            rep.resolve_link("next", Some("//atom:entry")).unwrap(),
            "/entry/next"
        );
        assert!(matches!(
            rep.resolve_link("self", Some("//atom:entry")),
            Err(Error::RelationNotFound(_))
        ));
        // filter selecting nothing leaves nothing to search
        assert!(matches!(
            rep.resolve_link("self", Some("//atom:missing")),
            Err(Error::RelationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_generic_has_no_body_fallback() {
        let rep = build(
            &[("Content-Type", "text/html"), ("Link", "</a>; rel=\"next\"")],
            br#"<link rel="last" href="/z"/>"#,
        )
        .await
        .unwrap();
        assert_eq!(rep.resolve_link("next", None).unwrap(), "/a");
        assert!(matches!(
            rep.resolve_link("last", None),
            Err(Error::RelationNotFound(ref r)) if r == "last"
        ));
    }

    #[tokio::test]
    async fn test_malformed_link_header_fails_construction() {
        let err = build(&[("Link", "not a link")], b"").await.unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }

    #[tokio::test]
    async fn test_structured_parse_error() {
        let err = build(&[("Content-Type", "application/xml")], b"<a><b></a>")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_generic_decode_once_with_charset() {
        let mut rep = build(
            &[("Content-Type", "text/plain; charset=ISO-8859-1")],
            b"caf\xe9 au lait",
        )
        .await
        .unwrap();
        assert_eq!(rep.charset(), Some("ISO-8859-1"));
        assert_eq!(rep.decode(Some(4)).await.unwrap(), "café");
        assert!(matches!(rep.decode(None).await, Err(Error::BodyConsumed)));
    }

    #[tokio::test]
    async fn test_generic_decode_without_charset_is_utf8() {
        let mut rep = build(&[("Content-Type", "application/json")], "{\"k\":\"é\"}".as_bytes())
            .await
            .unwrap();
        assert_eq!(rep.charset(), None);
        assert_eq!(rep.decode(None).await.unwrap(), "{\"k\":\"é\"}");
    }

    #[tokio::test]
    async fn test_structured_decode_repeatable_and_sniffs_prolog() {
        let mut rep = build(
            &[("Content-Type", "application/xml")],
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>\xe9</r>",
        )
        .await
        .unwrap();
        assert_eq!(rep.charset(), Some("ISO-8859-1"));
        let full = rep.decode(None).await.unwrap();
        assert!(full.ends_with("<r>é</r>"));
        assert_eq!(rep.decode(Some(5)).await.unwrap(), "<?xml");
    }

    #[tokio::test]
    async fn test_query() {
        let rep = build(&[("Content-Type", "application/atom+xml")], FEED).await.unwrap();
        assert_eq!(
            rep.query("//*[local-name()='link']/@rel").unwrap(),
            ["self", "next", "next"]
        );

        let generic = build(&[("Content-Type", "application/json")], b"{}").await.unwrap();
        assert!(matches!(
            generic.query("//x"),
            Err(Error::NotStructured(ref ct)) if ct == "application/json"
        ));
    }
}
