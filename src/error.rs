//! Error types for link navigation.

use thiserror::Error;

/// Boxed source error from a transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported URL scheme '{0}': only http and https are supported")]
    UnsupportedScheme(String),

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("malformed Link header segment: '{0}'")]
    MalformedHeader(String),

    #[error("relation '{0}' not found")]
    RelationNotFound(String),

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    #[error("response body already consumed")]
    BodyConsumed,

    #[error("representation is not structured (content type: {0})")]
    NotStructured(String),
}

impl Error {
    /// Wrap any transport-side failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Transport(err.into())
    }

    pub(crate) fn invalid_query(query: &str, reason: impl Into<String>) -> Self {
        Error::InvalidQuery {
            query: query.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
