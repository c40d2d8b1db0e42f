//! HTTP transport seam
//!
//! Navigation only needs "send a GET, get back status, headers and a body
//! stream". [`Transport`] is that contract; [`HttpTransport`] implements it
//! with reqwest.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use std::fmt;
use std::time::Duration;
use url::Url;

/// A GET request for one endpoint.
#[derive(Debug, Clone)]
pub struct Request {
    /// Endpoint URL; supplies scheme and authority.
    pub url: Url,
    /// Request target (`path[?query]`).
    pub path_and_query: String,
    /// Headers in send order; names may repeat.
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Absolute URL the request is sent to: the endpoint URL (userinfo
    /// included) with its path and query replaced, fragment dropped.
    pub fn target(&self) -> String {
        let (path, query) = match self.path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path_and_query.as_str(), None),
        };
        let mut url = self.url.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        url.to_string()
    }
}

/// Response status and headers plus a body that can be read once.
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Header value by case-insensitive name. Repeated headers are joined
    /// with `", "`.
    pub fn header(&self, name: &str) -> Option<String> {
        header_value(&self.headers, name)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub(crate) fn header_value(headers: &[(String, String)], name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Once-readable response body.
pub struct Body {
    stream: BoxStream<'static, Result<Bytes>>,
}

impl Body {
    pub fn empty() -> Self {
        Self {
            stream: stream::empty().boxed(),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        Self {
            stream: stream::once(async move { Ok(bytes) }).boxed(),
        }
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Read at most `limit` bytes (everything when `None`).
    ///
    /// Stops pulling from the stream once the limit is reached.
    pub async fn read(mut self, limit: Option<usize>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while limit.map_or(true, |max| buf.len() < max) {
            let Some(chunk) = self.stream.next().await else {
                break;
            };
            let chunk = chunk?;
            match limit {
                Some(max) => {
                    let room = max - buf.len();
                    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                None => buf.extend_from_slice(&chunk),
            }
        }
        Ok(buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body { .. }")
    }
}

/// Sends GET requests for a [`Service`](crate::Service).
///
/// Timeouts, proxies and TLS are the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: concat!("linkwalk/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(Error::transport)?;
        Ok(Self { client })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&HttpConfig::default()).unwrap_or_else(|_| Self {
            client: reqwest::Client::default(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let target = request.target();
        tracing::debug!(url = %target, "GET");

        let mut builder = self.client.get(&target);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(Error::transport)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        tracing::debug!(url = %target, status, "response");

        let body = Body::from_stream(response.bytes_stream().map_err(Error::transport));
        Ok(Response::new(status, headers, body))
    }
}
