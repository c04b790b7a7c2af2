//! Error types for the GraphQL client.

use thiserror::Error;

/// A boxed error returned by an [`HttpTransport`](crate::HttpTransport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`Client::run`](crate::Client::run).
///
/// GraphQL-level errors (the `errors` array of a response) are not part of
/// this type. They are delivered through the destination value.
#[derive(Debug, Error)]
pub enum GraphQLClientError {
    /// A variable, header, or file attachment could not be encoded.
    #[error("graphql: encoding request: {0}")]
    Encode(String),

    /// The endpoint URL could not be parsed.
    #[error("graphql: invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP transport failed to complete the exchange.
    #[error("graphql: request failed: {source}")]
    Transport {
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The response body could not be read.
    #[error("graphql: reading body: {source}")]
    ReadBody {
        /// The underlying I/O error.
        #[source]
        source: BoxError,
    },

    /// The caller cancelled the operation.
    #[error("graphql: request cancelled")]
    Cancelled,

    /// The context deadline passed before the operation completed.
    #[error("graphql: deadline exceeded")]
    DeadlineExceeded,

    /// The server answered with a status that does not carry a GraphQL payload.
    #[error("graphql: server returned a non-200 status code: {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// A successful response did not contain a decodable GraphQL envelope.
    #[error("graphql: decoding response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GraphQLClientError {
    pub(crate) fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport {
            source: source.into(),
        }
    }

    pub(crate) fn read_body(source: impl Into<BoxError>) -> Self {
        Self::ReadBody {
            source: source.into(),
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the context deadline or a transport timeout fired.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::Transport { source } | Self::ReadBody { source } => source
                .downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout),
            _ => false,
        }
    }
}

/// A specialized Result type for GraphQL client operations.
pub type Result<T> = std::result::Result<T, GraphQLClientError>;
