//! GraphQL response types and status classification.

use std::fmt;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphQLClientError, Result};

/// A GraphQL error returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// The error message.
    pub message: String,

    /// Locations in the document where the error occurred.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphQLLocation>,

    /// Path to the field that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,

    /// Additional error metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref path) = self.path {
            write!(f, " (at ")?;
            for (i, segment) in path.iter().enumerate() {
                match segment {
                    PathSegment::Field(name) if i > 0 => write!(f, ".{name}")?,
                    PathSegment::Field(name) => write!(f, "{name}")?,
                    PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphQLError {}

/// A location in a GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLLocation {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

/// A segment in an error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A field name.
    Field(String),
    /// An array index.
    Index(usize),
}

/// The `{data, errors}` envelope of a GraphQL response.
///
/// Usable directly as the destination of
/// [`Client::run`](crate::Client::run), with `T` describing the shape of
/// `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphQLResponse<T = Value> {
    /// The data returned by the operation.
    #[serde(default)]
    pub data: Option<T>,

    /// Errors that occurred during execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,

    /// Additional response metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> Default for GraphQLResponse<T> {
    fn default() -> Self {
        Self {
            data: None,
            errors: Vec::new(),
            extensions: None,
        }
    }
}

impl<T> GraphQLResponse<T> {
    /// Check if the response contains errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the response was successful (has data and no errors).
    pub fn is_success(&self) -> bool {
        self.data.is_some() && self.errors.is_empty()
    }

    /// Get the first error, if any.
    pub fn first_error(&self) -> Option<&GraphQLError> {
        self.errors.first()
    }

    /// Get all error messages joined with `"; "`.
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(
                self.errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        }
    }

    /// Borrow the decoded data.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Return the response if it has no errors, or the errors otherwise.
    pub fn into_result(self) -> std::result::Result<Self, Vec<GraphQLError>> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(self.errors)
        }
    }
}

/// Only what status classification needs to know about the body.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

impl RawEnvelope {
    fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// Classify a fully read response and decode it into `D`.
///
/// - 2xx: the body must be a GraphQL envelope or `null`. GraphQL errors are
///   left for the destination to carry; `null` decodes to `None`.
/// - 400: handled like 2xx when the body is an envelope with at least one
///   error, otherwise a status error.
/// - anything else: a status error. The body is discarded.
pub(crate) fn decode_response<D>(status: StatusCode, body: &[u8]) -> Result<Option<D>>
where
    D: DeserializeOwned,
{
    let envelope = serde_json::from_slice::<Option<RawEnvelope>>(body);

    if status.is_success() {
        return match envelope? {
            Some(_) => Ok(Some(serde_json::from_slice(body)?)),
            None => Ok(None),
        };
    }

    if status == StatusCode::BAD_REQUEST
        && let Ok(Some(envelope)) = &envelope
        && envelope.has_errors()
    {
        return Ok(Some(serde_json::from_slice(body)?));
    }

    tracing::warn!(
        target: "horizon_lattice_graphql::response",
        status = status.as_u16(),
        body_len = body.len(),
        "discarding response body of unsuccessful request"
    );
    Err(GraphQLClientError::Status {
        status: status.as_u16(),
    })
}
