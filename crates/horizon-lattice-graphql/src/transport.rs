//! The HTTP transport used by the client.
//!
//! [`HttpTransport`] performs one request/response exchange. `reqwest::Client`
//! implements it, which makes a pooled reqwest client the default. Any other
//! type can be injected, including the closure adapter [`transport_fn`].

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::error::BoxError;

/// Executes a single HTTP exchange.
///
/// Implementations must not retry. Redirect handling is left to the
/// implementation.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    /// Send `request` and return the response headers with an unread body.
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, BoxError>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, BoxError> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(Into::into)
    }
}

/// Build a transport from an async closure.
///
/// # Example
///
/// ```ignore
/// use horizon_lattice_graphql::transport_fn;
///
/// let transport = transport_fn(|_request| async {
///     let response = http::Response::builder()
///         .status(200)
///         .body(r#"{"data":{"key":"value"}}"#)
///         .unwrap();
///     Ok(reqwest::Response::from(response))
/// });
/// ```
pub fn transport_fn<F, Fut>(f: F) -> TransportFn<F>
where
    F: Fn(reqwest::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<reqwest::Response, BoxError>> + Send + 'static,
{
    TransportFn { f }
}

/// A transport backed by a closure. See [`transport_fn`].
pub struct TransportFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> HttpTransport for TransportFn<F>
where
    F: Fn(reqwest::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<reqwest::Response, BoxError>> + Send + 'static,
{
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, BoxError> {
        (self.f)(request).await
    }
}

impl<F> fmt::Debug for TransportFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportFn").finish_non_exhaustive()
    }
}
