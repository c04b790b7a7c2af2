//! GraphQL request types.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncRead;

use crate::error::{GraphQLClientError, Result};

/// A readable stream holding the contents of a file attachment.
pub(crate) type FileContent = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// A file sent as its own part of a multipart request.
pub struct FileAttachment {
    pub(crate) field_name: String,
    pub(crate) file_name: String,
    pub(crate) content: FileContent,
}

impl FileAttachment {
    /// The form field name of the part.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The filename reported in the part's `Content-Disposition`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAttachment")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// A GraphQL request.
///
/// The query text is opaque to the client. Variables keep their insertion
/// order on the wire. File attachments are only transmitted when the client
/// uses multipart form encoding.
///
/// Builder methods never fail eagerly. The first problem (an invalid header,
/// an unserializable variable, an empty name) is recorded and reported by
/// [`Client::run`](crate::Client::run) before anything is sent.
///
/// # Example
///
/// ```ignore
/// use horizon_lattice_graphql::Request;
///
/// let request = Request::new("query ($id: ID!) { user(id: $id) { name } }")
///     .var("id", "123")
///     .header("Authorization", "Bearer token");
/// ```
pub struct Request {
    query: String,
    variables: Map<String, Value>,
    files: Vec<FileAttachment>,
    headers: HeaderMap,
    error: Option<GraphQLClientError>,
}

impl Request {
    /// Create a request for the given query or mutation text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
            files: Vec::new(),
            headers: HeaderMap::new(),
            error: None,
        }
    }

    /// Bind a variable, replacing any previous value with the same name.
    pub fn var(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let name = name.into();
        if name.is_empty() {
            self.fail("variable name must not be empty".into());
            return self;
        }
        match serde_json::to_value(value) {
            Ok(value) => {
                self.variables.insert(name, value);
            }
            Err(e) => self.fail(format!("variable `{name}`: {e}")),
        }
        self
    }

    /// Attach a file read from `content`.
    ///
    /// The stream is read once, while the request is encoded. Several files
    /// may share a field name; each is sent as a separate part.
    pub fn file<R>(
        mut self,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content: R,
    ) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let field_name = field_name.into();
        if field_name.is_empty() {
            self.fail("file field name must not be empty".into());
            return self;
        }
        self.files.push(FileAttachment {
            field_name,
            file_name: file_name.into(),
            content: Box::new(content),
        });
        self
    }

    /// Attach a file from an in-memory buffer.
    pub fn file_bytes(
        self,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        self.file(field_name, file_name, std::io::Cursor::new(content.into()))
    }

    /// Set a header, replacing any existing values for that name.
    pub fn header<N, V>(mut self, name: N, value: V) -> Self
    where
        HeaderName: TryFrom<N>,
        <HeaderName as TryFrom<N>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append a header value, keeping existing values for that name.
    pub fn add_header<N, V>(mut self, name: N, value: V) -> Self
    where
        HeaderName: TryFrom<N>,
        <HeaderName as TryFrom<N>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.append(name, value);
        }
        self
    }

    /// Mutable access to the outbound headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The outbound headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The bound variables, in insertion order.
    pub fn vars(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// The attached files.
    pub fn files(&self) -> &[FileAttachment] {
        &self.files
    }

    /// Check if any file is attached.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Split into parts for encoding, surfacing any deferred builder error.
    pub(crate) fn into_parts(self) -> Result<RequestParts> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(RequestParts {
            query: self.query,
            variables: self.variables,
            files: self.files,
            headers: self.headers,
        })
    }

    fn header_pair<N, V>(&mut self, name: N, value: V) -> Option<(HeaderName, HeaderValue)>
    where
        HeaderName: TryFrom<N>,
        <HeaderName as TryFrom<N>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                let e: http::Error = e.into();
                self.fail(format!("header name: {e}"));
                return None;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => Some((name, value)),
            Err(e) => {
                let e: http::Error = e.into();
                self.fail(format!("header `{name}`: {e}"));
                None
            }
        }
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(GraphQLClientError::Encode(message));
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("query", &self.query)
            .field("variables", &self.variables)
            .field("files", &self.files)
            .field("headers", &self.headers)
            .finish()
    }
}

/// A request taken apart for encoding.
pub(crate) struct RequestParts {
    pub(crate) query: String,
    pub(crate) variables: Map<String, Value>,
    pub(crate) files: Vec<FileAttachment>,
    pub(crate) headers: HeaderMap,
}
