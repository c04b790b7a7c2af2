//! GraphQL client implementation.

use std::fmt;
use std::sync::Arc;

use http::HeaderValue;
use http::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use url::Url;

use crate::context::Context;
use crate::encode::{BodyPolicy, EncodeMode, Encoder};
use crate::error::{GraphQLClientError, Result};
use crate::request::{Request, RequestParts};
use crate::response::{GraphQLResponse, decode_response};
use crate::transport::HttpTransport;

/// Diagnostic sink receiving one line per event.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

const DEFAULT_ACCEPT: &str = "application/json; charset=utf-8";

/// Immutable client settings chosen at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Wire encoding of requests.
    pub mode: EncodeMode,
    /// Whether request bodies are buffered or streamed.
    pub body_policy: BodyPolicy,
}

/// Builder for creating a GraphQL client.
pub struct ClientBuilder {
    endpoint: String,
    transport: Option<Arc<dyn HttpTransport>>,
    config: ClientConfig,
    logger: Option<Logger>,
}

impl ClientBuilder {
    /// Create a new builder with the specified GraphQL endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: None,
            config: ClientConfig::default(),
            logger: None,
        }
    }

    /// Use a specific HTTP transport instead of the default pooled client.
    pub fn http_client(mut self, transport: impl HttpTransport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Encode requests as `multipart/form-data`, which allows file uploads.
    ///
    /// Requests are JSON encoded by default.
    pub fn use_multipart_form(mut self) -> Self {
        self.config.mode = EncodeMode::Multipart;
        self
    }

    /// Fully buffer and close each request body before it is sent.
    pub fn immediately_close_req_body(mut self) -> Self {
        self.config.body_policy = BodyPolicy::Buffered;
        self
    }

    /// Receive diagnostic lines about outgoing requests and their responses.
    pub fn logger(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Build the GraphQL client.
    ///
    /// The endpoint must be an absolute URL, even when a custom transport is
    /// injected with [`http_client`](Self::http_client). An empty or relative
    /// endpoint fails with [`GraphQLClientError::InvalidUrl`].
    pub fn build(self) -> Result<Client> {
        let endpoint = Url::parse(&self.endpoint)?;

        let http = reqwest::Client::builder()
            .user_agent(format!(
                "HorizonLatticeGraphQL/{} (Rust)",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(GraphQLClientError::transport)?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(http.clone()),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                endpoint,
                http,
                transport,
                encoder: Encoder::new(self.config.mode, self.config.body_policy),
                config: self.config,
                logger: self.logger,
            }),
        })
    }
}

struct ClientInner {
    endpoint: Url,
    /// Assembles outgoing requests; only sends them when it is also the transport.
    http: reqwest::Client,
    transport: Arc<dyn HttpTransport>,
    encoder: Encoder,
    config: ClientConfig,
    logger: Option<Logger>,
}

/// A GraphQL client for queries and mutations over HTTP.
///
/// Cloning is cheap and clones share the underlying transport, so a single
/// client can serve concurrent calls.
///
/// # Example
///
/// ```ignore
/// use horizon_lattice_graphql::{Client, Context, GraphQLResponse, Request};
///
/// let client = Client::new("https://api.example.com/graphql").build()?;
///
/// let request = Request::new("query ($id: ID!) { user(id: $id) { name } }")
///     .var("id", "123");
///
/// let mut response = GraphQLResponse::<serde_json::Value>::default();
/// client.run(&Context::background(), request, &mut response).await?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a new GraphQL client with the specified endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Create a new builder for configuring a GraphQL client.
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// The endpoint every request is posted to.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// The settings the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Run a GraphQL operation and decode the response into `destination`.
    ///
    /// `destination` is replaced by the decoded response body, so it should
    /// model the `{data, errors}` envelope, for example [`GraphQLResponse`].
    /// GraphQL errors in the response do not fail the call; they arrive in
    /// the destination. On any error, and when a successful response body is
    /// the JSON literal `null`, `destination` is left untouched.
    pub async fn run<D>(&self, ctx: &Context, request: Request, destination: &mut D) -> Result<()>
    where
        D: DeserializeOwned,
    {
        if let Some(value) = self.fetch(ctx, request).await? {
            *destination = value;
        }
        Ok(())
    }

    /// Run a GraphQL operation and return the decoded envelope.
    ///
    /// A successful `null` body yields an empty envelope.
    pub async fn execute<T>(&self, ctx: &Context, request: Request) -> Result<GraphQLResponse<T>>
    where
        T: DeserializeOwned,
    {
        Ok(self.fetch(ctx, request).await?.unwrap_or_default())
    }

    async fn fetch<D>(&self, ctx: &Context, request: Request) -> Result<Option<D>>
    where
        D: DeserializeOwned,
    {
        let RequestParts {
            query,
            variables,
            files,
            mut headers,
        } = request.into_parts()?;

        if self.inner.logger.is_some() {
            let variables = serde_json::to_string(&variables)
                .map_err(|e| GraphQLClientError::Encode(format!("variables: {e}")))?;
            self.log(&format!(">> variables: {variables}"));
            self.log(&format!(">> query: {query}"));
        }

        let encoded = ctx
            .guard(self.inner.encoder.encode(&query, &variables, files))
            .await?;

        // The encoder owns the content type.
        headers.remove(CONTENT_TYPE);
        let builder = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .headers(headers);
        let (builder, read_failure) = encoded.attach(builder);
        let mut http_request = builder
            .build()
            .map_err(|e| GraphQLClientError::Encode(format!("building request: {e}")))?;
        http_request
            .headers_mut()
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT));

        tracing::debug!(
            target: "horizon_lattice_graphql::client",
            endpoint = %self.inner.endpoint,
            mode = ?self.inner.config.mode,
            body_policy = ?self.inner.config.body_policy,
            "sending GraphQL request"
        );

        let transport = &self.inner.transport;
        let response = match ctx
            .guard(async {
                transport
                    .execute(http_request)
                    .await
                    .map_err(GraphQLClientError::transport)
            })
            .await
        {
            Ok(response) => response,
            Err(err @ GraphQLClientError::Transport { .. }) => {
                return Err(read_failure.take().unwrap_or(err));
            }
            Err(err) => return Err(err),
        };

        let status = response.status();
        let body = ctx
            .guard(async { response.bytes().await.map_err(GraphQLClientError::read_body) })
            .await?;

        tracing::debug!(
            target: "horizon_lattice_graphql::client",
            status = status.as_u16(),
            body_len = body.len(),
            "received GraphQL response"
        );
        self.log(&format!("<< {}", String::from_utf8_lossy(&body)));

        decode_response(status, &body)
    }

    fn log(&self, line: &str) {
        if let Some(logger) = &self.inner.logger {
            logger(line);
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("config", &self.inner.config)
            .field("logger", &self.inner.logger.is_some())
            .finish()
    }
}
