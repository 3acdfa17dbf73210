//! The transport collaborator: performs one attempt, never retries.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::TransportError;
use crate::request::Request;
use crate::response::Response;

/// Sends a request once.
///
/// Implementations must not retry internally; retries belong to the
/// pipeline. Any HTTP status is a successful send; only connection-level
/// problems are errors.
pub trait Transport: Send + Sync {
    /// Perform one attempt.
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        (**self).send(request)
    }
}

/// [`Transport`] built from an async closure. See [`transport_fn`].
pub struct FnTransport<F> {
    send: F,
}

impl<F> fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransport").finish_non_exhaustive()
    }
}

/// Adapt an async closure into a [`Transport`].
///
/// The closure receives a clone of the request for each attempt.
///
/// # Examples
///
/// ```rust
/// use retryline::{transport_fn, Pipeline, Request, Response, StatusCode};
///
/// # tokio_test::block_on(async {
/// let transport = transport_fn(|request: Request| async move {
///     Ok(Response::new(StatusCode::OK).with_body(request.url().to_owned()))
/// });
/// let pipeline = Pipeline::builder(transport).build().unwrap();
///
/// let response = pipeline.send(Request::get("https://example.com")).await.unwrap();
/// assert_eq!(response.body(), b"https://example.com");
/// # });
/// ```
pub fn transport_fn<F, Fut>(send: F) -> FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    FnTransport { send }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin((self.send)(request.clone()))
    }
}
