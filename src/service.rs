//! Navigable hypermedia endpoints

use crate::error::{Error, Result};
use crate::representation::Representation;
use crate::transport::{HttpTransport, Request, Transport};
use crate::urls::{compose_path, resolve_absolute_url};
use crate::xml::Namespaces;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A resource you can fetch and follow links from.
///
/// Services are values: `find`, `follow_link` and the builder methods return
/// new services and never change `self`. Persistent headers and namespace
/// bindings carry over to every service reached by following links; the
/// filter does not.
#[derive(Clone)]
pub struct Service {
    url: String,
    headers: Vec<(String, String)>,
    filter: Option<String>,
    namespaces: Namespaces,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("filter", &self.filter)
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Endpoint at `url` using the default reqwest transport.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_transport(url, Arc::new(HttpTransport::default()))
    }

    pub fn with_transport(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            filter: None,
            namespaces: Namespaces::new(),
            transport,
        }
    }

    /// Add a header sent with every request from this service and any
    /// service reached from it.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Bind a namespace prefix for filters and queries.
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Same endpoint, with body link search scoped to the elements `query`
    /// selects. No request is made.
    pub fn find(&self, query: impl Into<String>) -> Service {
        Service {
            filter: Some(query.into()),
            ..self.clone()
        }
    }

    /// Fetch this resource.
    ///
    /// `params` are appended to the URL's query. `headers` are sent before
    /// the persistent headers; if both name the same header (ignoring
    /// case) the persistent one is sent and the explicit one dropped.
    pub async fn get(
        &self,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Representation> {
        let url = Url::parse(&self.url).map_err(|source| Error::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::UnsupportedScheme(url.scheme().to_string()));
        }

        let request = Request {
            path_and_query: compose_path(&url, params),
            headers: self.merge_headers(headers),
            url,
        };
        tracing::debug!(url = %self.url, path = %request.path_and_query, "fetching");

        let response = self.transport.send(request).await?;
        Representation::from_response(response, self.namespaces.clone()).await
    }

    /// Fetch with no extra params or headers.
    pub async fn fetch(&self) -> Result<Representation> {
        self.get(&[], &[]).await
    }

    /// Fetch this resource, resolve `relation` (within the current filter)
    /// and return the service at its absolute URL.
    pub async fn follow_link(&self, relation: &str) -> Result<Service> {
        let representation = self.fetch().await?;
        let target = representation.resolve_link(relation, self.filter())?;
        let absolute = resolve_absolute_url(&target, &self.url);
        tracing::debug!(from = %self.url, relation, to = %absolute, "followed link");
        Ok(self.at(absolute))
    }

    /// Follow each relation in turn, e.g. `["next", "next", "prev"]`.
    pub async fn follow_path<I, S>(&self, relations: I) -> Result<Service>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self.clone();
        for relation in relations {
            current = current.follow_link(relation.as_ref()).await?;
        }
        Ok(current)
    }

    /// Service at `url` carrying this one's headers, namespaces and
    /// transport, without a filter.
    fn at(&self, url: String) -> Service {
        Service {
            url,
            headers: self.headers.clone(),
            filter: None,
            namespaces: self.namespaces.clone(),
            transport: Arc::clone(&self.transport),
        }
    }

    fn merge_headers(&self, explicit: &[(&str, &str)]) -> Vec<(String, String)> {
        explicit
            .iter()
            .filter(|(name, _)| {
                !self
                    .headers
                    .iter()
                    .any(|(persistent, _)| persistent.eq_ignore_ascii_case(name))
            })
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .chain(self.headers.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Body, Response};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned responses keyed by request target; records requests.
    #[derive(Default)]
    struct Canned {
        responses: HashMap<String, (Vec<(String, String)>, &'static str)>,
        seen: Mutex<Vec<Request>>,
    }

    impl Canned {
        fn with(mut self, target: &str, headers: &[(&str, &str)], body: &'static str) -> Self {
            self.responses.insert(
                target.to_string(),
                (
                    headers
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    body,
                ),
            );
            self
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, request: Request) -> Result<Response> {
            let target = request.target();
            self.seen.lock().unwrap().push(request);
            let (headers, body) = self
                .responses
                .get(&target)
                .cloned()
                .ok_or_else(|| Error::transport(format!("no route to {target}")))?;
            Ok(Response::new(200, headers, Body::from_bytes(body)))
        }
    }

    fn service(transport: Canned) -> (Service, Arc<Canned>) {
        let transport = Arc::new(transport);
        let service = Service::with_transport("http://api.example/root", transport.clone());
        (service, transport)
    }

    #[tokio::test]
    async fn test_follow_link_from_header() {
        let (root, _) = service(Canned::default().with(
            "http://api.example/root",
            &[("Link", "</a>; rel=\"next\"")],
            "",
        ));
        let next = root.follow_link("next").await.unwrap();
        assert_eq!(next.url(), "http://api.example/a");
        assert_eq!(root.url(), "http://api.example/root");
    }

    #[tokio::test]
    async fn test_follow_link_from_body() {
        let (root, _) = service(Canned::default().with(
            "http://api.example/root",
            &[("Content-Type", "application/xml")],
            r#"<links><link rel="last" href="/z"/></links>"#,
        ));
        let last = root.follow_link("last").await.unwrap();
        assert_eq!(last.url(), "http://api.example/z");
    }

    #[tokio::test]
    async fn test_relative_target_joins_base_path() {
        let (root, _) = service(Canned::default().with(
            "http://api.example/root",
            &[("Link", "<page/2>; rel=\"next\"")],
            "",
        ));
        let next = root.follow_link("next").await.unwrap();
        assert_eq!(next.url(), "http://api.example/root/page/2");
    }

    #[tokio::test]
    async fn test_missing_relation() {
        let (root, _) = service(Canned::default().with(
            "http://api.example/root",
            &[("Content-Type", "text/xml"), ("Link", "</a>; rel=\"next\"")],
            "<r/>",
        ));
        let err = root.follow_link("prev").await.unwrap_err();
        assert!(matches!(err, Error::RelationNotFound(ref r) if r == "prev"));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_and_invalid_url() {
        let transport: Arc<dyn Transport> = Arc::new(Canned::default());
        let ftp = Service::with_transport("ftp://files.example/x", transport.clone());
        assert!(matches!(
            ftp.fetch().await,
            Err(Error::UnsupportedScheme(ref s)) if s == "ftp"
        ));

        let relative = Service::with_transport("/just/a/path", transport);
        assert!(matches!(relative.fetch().await, Err(Error::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_params_and_header_merge() {
        let (root, transport) = service(Canned::default().with(
            "http://api.example/root?page=2",
            &[],
            "",
        ));
        let root = root
            .header("Accept", "application/atom+xml")
            .header("Authorization", "token abc");

        root.get(&[("page", "2")], &[("accept", "text/html"), ("X-Trace", "1")])
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].headers,
            vec![
                ("X-Trace".to_string(), "1".to_string()),
                ("Accept".to_string(), "application/atom+xml".to_string()),
                ("Authorization".to_string(), "token abc".to_string()),
            ]
        );
        assert_eq!(seen[0].path_and_query, "/root?page=2");
    }

    #[tokio::test]
    async fn test_follow_carries_headers_and_namespaces_not_filter() {
        let (root, transport) = service(
            Canned::default()
                .with(
                    "http://api.example/root",
                    &[("Content-Type", "application/atom+xml")],
                    r#"<feed xmlns="http://www.w3.org/2005/Atom">
                         <link rel="next" href="/feed-next"/>
                         <entry><link rel="next" href="/entry-next"/></entry>
                       </feed>"#,
                )
                .with("http://api.example/entry-next", &[("Link", "</end>; rel=\"next\"")], ""),
        );
        let root = root
            .header("Authorization", "token abc")
            .namespace("atom", "http://www.w3.org/2005/Atom");

        let scoped = root.find("//atom:entry");
        assert_eq!(scoped.filter(), Some("//atom:entry"));
        assert_eq!(root.filter(), None);

        let next = scoped.follow_link("next").await.unwrap();
        assert_eq!(next.url(), "http://api.example/entry-next");
        assert_eq!(next.filter(), None);
        assert_eq!(next.headers(), root.headers());
        assert_eq!(next.namespaces(), root.namespaces());

        let end = next.follow_link("next").await.unwrap();
        assert_eq!(end.url(), "http://api.example/end");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen
            .iter()
            .all(|r| r.headers == vec![("Authorization".to_string(), "token abc".to_string())]));
    }

    #[tokio::test]
    async fn test_follow_path_cycle() {
        let (root, _) = service(
            Canned::default()
                .with("http://api.example/root", &[("Link", "</p2>; rel=\"next\"")], "")
                .with(
                    "http://api.example/p2",
                    &[("Link", "</p3>; rel=\"next\", </root>; rel=\"prev\"")],
                    "",
                )
                .with("http://api.example/p3", &[("Link", "</p2>; rel=\"prev\"")], ""),
        );
        let back = root.follow_path(["next", "next", "prev"]).await.unwrap();
        assert_eq!(back.url(), "http://api.example/p2");

        let home = root.follow_path(vec!["next".to_string(), "prev".to_string()]).await.unwrap();
        assert_eq!(home.url(), root.url());
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let (root, _) = service(Canned::default());
        assert!(matches!(
            root.follow_link("next").await,
            Err(Error::Transport(_))
        ));
    }
}
