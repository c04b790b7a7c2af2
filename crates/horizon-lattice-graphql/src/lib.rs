//! GraphQL over HTTP client for Horizon Lattice.
//!
//! This crate sends GraphQL queries and mutations to a remote endpoint and
//! decodes the response into a destination value chosen by the caller:
//!
//! - **Requests**: query text, ordered variables, file attachments and
//!   per-request headers
//! - **Encodings**: a JSON body, or a `multipart/form-data` body carrying file
//!   uploads
//! - **Body policies**: streamed while sending, or fully buffered first
//! - **Cancellation**: every call runs under a [`Context`] with an optional
//!   deadline and cancel handle
//!
//! The client does not parse or validate GraphQL and never retries.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use horizon_lattice_graphql::{Client, Context, GraphQLResponse, Request};
//!
//! let client = Client::new("https://api.example.com/graphql").build()?;
//!
//! let request = Request::new("query ($login: String!) { user(login: $login) { name } }")
//!     .var("login", "matryer")
//!     .header("Authorization", "Bearer my-token");
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(10));
//! let mut response = GraphQLResponse::<serde_json::Value>::default();
//! client.run(&ctx, request, &mut response).await?;
//!
//! if let Some(message) = response.error_message() {
//!     eprintln!("GraphQL errors: {message}");
//! }
//! ```
//!
//! # File Uploads
//!
//! ```ignore
//! let client = Client::new("https://api.example.com/graphql")
//!     .use_multipart_form()
//!     .build()?;
//!
//! let file = tokio::fs::File::open("avatar.png").await?;
//! let request = Request::new("mutation { upload }").file("file", "avatar.png", file);
//! let response: GraphQLResponse = client.execute(&Context::background(), request).await?;
//! ```
//!
//! # Status Handling
//!
//! | Status | Outcome |
//! |--------|---------|
//! | 2xx | body decoded into the destination |
//! | 400 with a non-empty `errors` array | body decoded into the destination |
//! | anything else | [`GraphQLClientError::Status`] |

mod client;
mod context;
mod encode;
mod error;
mod request;
mod response;
mod transport;

pub use client::{Client, ClientBuilder, ClientConfig, Logger};
pub use context::{CancelHandle, Context};
pub use encode::{BodyPolicy, EncodeMode, JSON_CONTENT_TYPE};
pub use error::{BoxError, GraphQLClientError, Result};
pub use request::{FileAttachment, Request};
pub use response::{GraphQLError, GraphQLLocation, GraphQLResponse, PathSegment};
pub use transport::{HttpTransport, TransportFn, transport_fn};
