//! Wire encoding of GraphQL requests.
//!
//! Two encodings are supported:
//!
//! - **JSON**: a single `{"query":...,"variables":...}` object followed by a
//!   newline. Empty variables are sent as `null`.
//! - **Multipart**: a `multipart/form-data` body with a `query` field, a
//!   `variables` field holding the JSON-encoded variables, and one file part
//!   per attachment.
//!
//! Multipart file contents are either drained up front or streamed while the
//! transport sends the body, depending on the [`BodyPolicy`].

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::CONTENT_TYPE;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::error::{GraphQLClientError, Result};
use crate::request::FileAttachment;

/// Content type of JSON encoded requests.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Content type of file parts.
const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Read size used when streaming file attachments.
const FILE_CHUNK_SIZE: usize = 8 * 1024;

/// How a request is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeMode {
    /// `application/json` body. File attachments are not sent.
    #[default]
    Json,
    /// `multipart/form-data` body carrying file attachments.
    Multipart,
}

/// When the request body is produced relative to sending it.
///
/// Only multipart requests are affected; JSON bodies are always built in
/// memory. Under either policy a failing file reader is reported as
/// [`GraphQLClientError::Encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyPolicy {
    /// Read file attachments while the transport transmits the body. The
    /// request is sent without a `Content-Length`.
    #[default]
    Streamed,
    /// Read every file attachment before the request is issued, so the body
    /// has a known length.
    Buffered,
}

/// Records the first file read failure of a streamed body.
///
/// A streamed body is polled by the transport, so a failing reader surfaces
/// there as a transport error. The client consults this record to report it
/// as an encoding failure instead.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadFailure {
    inner: Arc<Mutex<Option<String>>>,
}

impl ReadFailure {
    fn record(&self, field_name: &str, err: &io::Error) {
        let mut slot = self.inner.lock();
        if slot.is_none() {
            *slot = Some(format!("reading file `{field_name}`: {err}"));
        }
    }

    /// Take the recorded failure as an error, if any.
    pub(crate) fn take(&self) -> Option<GraphQLClientError> {
        self.inner.lock().take().map(GraphQLClientError::Encode)
    }
}

enum BodyKind {
    Json(Bytes),
    Multipart(Form),
}

/// An encoded request body, ready to be attached to a request.
pub(crate) struct EncodedBody {
    kind: BodyKind,
    read_failure: ReadFailure,
}

impl EncodedBody {
    /// Attach the body and its `Content-Type` to `builder`.
    ///
    /// Multipart bodies made only of buffered parts also get a
    /// `Content-Length`.
    pub(crate) fn attach(self, builder: reqwest::RequestBuilder) -> (reqwest::RequestBuilder, ReadFailure) {
        let builder = match self.kind {
            BodyKind::Json(bytes) => builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(bytes),
            BodyKind::Multipart(form) => builder.multipart(form),
        };
        (builder, self.read_failure)
    }
}

/// Encodes requests in a fixed mode and body policy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Encoder {
    mode: EncodeMode,
    policy: BodyPolicy,
}

impl Encoder {
    pub(crate) fn new(mode: EncodeMode, policy: BodyPolicy) -> Self {
        Self { mode, policy }
    }

    /// Encode a request.
    ///
    /// With [`BodyPolicy::Buffered`] this drains every file attachment, so it
    /// should run under the caller's context.
    pub(crate) async fn encode(
        &self,
        query: &str,
        variables: &Map<String, Value>,
        files: Vec<FileAttachment>,
    ) -> Result<EncodedBody> {
        let read_failure = ReadFailure::default();
        let kind = match self.mode {
            EncodeMode::Json => {
                if !files.is_empty() {
                    tracing::debug!(
                        target: "horizon_lattice_graphql::encode",
                        count = files.len(),
                        "ignoring file attachments in JSON mode"
                    );
                }
                BodyKind::Json(encode_json(query, variables)?)
            }
            EncodeMode::Multipart => {
                let mut form = Form::new()
                    .text("query", query.to_owned())
                    .text("variables", encode_variables_field(variables)?);
                for file in files {
                    let field_name = file.field_name.clone();
                    let part = match self.policy {
                        BodyPolicy::Buffered => buffered_part(file).await?,
                        BodyPolicy::Streamed => streamed_part(file, read_failure.clone()),
                    };
                    let part = part.mime_str(FILE_CONTENT_TYPE).map_err(|e| {
                        GraphQLClientError::Encode(format!("file `{field_name}`: {e}"))
                    })?;
                    form = form.part(field_name, part);
                }
                BodyKind::Multipart(form)
            }
        };
        Ok(EncodedBody { kind, read_failure })
    }
}

#[derive(Serialize)]
struct JsonBody<'a> {
    query: &'a str,
    variables: Option<&'a Map<String, Value>>,
}

/// Encode `{"query":...,"variables":...}` followed by a newline.
pub(crate) fn encode_json(query: &str, variables: &Map<String, Value>) -> Result<Bytes> {
    let body = JsonBody {
        query,
        variables: (!variables.is_empty()).then_some(variables),
    };
    let mut buf = serde_json::to_vec(&body)
        .map_err(|e| GraphQLClientError::Encode(format!("request body: {e}")))?;
    buf.push(b'\n');
    Ok(buf.into())
}

/// Encode the `variables` form field: a JSON object, or `null` when empty.
fn encode_variables_field(variables: &Map<String, Value>) -> Result<String> {
    let mut field = if variables.is_empty() {
        "null".to_owned()
    } else {
        serde_json::to_string(variables)
            .map_err(|e| GraphQLClientError::Encode(format!("variables: {e}")))?
    };
    field.push('\n');
    Ok(field)
}

async fn buffered_part(file: FileAttachment) -> Result<Part> {
    let FileAttachment {
        field_name,
        file_name,
        mut content,
    } = file;
    let mut data = Vec::new();
    content
        .read_to_end(&mut data)
        .await
        .map_err(|e| GraphQLClientError::Encode(format!("reading file `{field_name}`: {e}")))?;
    Ok(Part::bytes(data).file_name(file_name))
}

fn streamed_part(file: FileAttachment, read_failure: ReadFailure) -> Part {
    let FileAttachment {
        field_name,
        file_name,
        content,
    } = file;
    let chunks = ReaderStream::with_capacity(content, FILE_CHUNK_SIZE)
        .inspect_err(move |e| read_failure.record(&field_name, e));
    Part::stream(reqwest::Body::wrap_stream(chunks)).file_name(file_name)
}
