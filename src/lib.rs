//! linkwalk: Hypermedia navigation over HTTP
//!
//! Start from a [`Service`] and follow link relations by name. Relations are
//! looked up in the RFC 5988 `Link` header first, then in `<link>` elements
//! of XML bodies.
//!
//! Commands:
//! - follow: Walk a chain of relations from a root URL
//! - links: Report the relations each URL offers
//! - select: Evaluate a path query against an XML resource

pub mod error;
pub mod follow;
pub mod link_header;
pub mod links;
pub mod options;
pub mod query;
pub mod representation;
pub mod select;
pub mod service;
pub mod transport;
pub mod urls;
pub mod xml;

pub use error::{Error, Result};
pub use link_header::{parse_link_header, LinkTable};
pub use representation::{ContentType, Representation};
pub use service::Service;
pub use transport::{Body, HttpConfig, HttpTransport, Request, Response, Transport};
pub use urls::{compose_path, extract_charset, resolve_absolute_url};
pub use xml::{Document, Namespaces};
