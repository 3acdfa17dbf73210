//! Outbound request descriptor.

use std::time::Duration;

use http::header::{HeaderValue, IntoHeaderName};
use http::Method;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::headers::Headers;

/// Descriptor of one logical outbound operation.
///
/// The request id is generated once at construction and is never changed by
/// the pipeline, so every attempt of a retried operation carries the same id.
/// The body is held in memory and replayed on each attempt.
///
/// # Examples
///
/// ```rust
/// use retryline::http::header::CONTENT_TYPE;
/// use retryline::{HeaderValue, Method, Request};
/// use std::time::Duration;
///
/// let request = Request::new(Method::PUT, "https://vault.example.com/secrets/a")
///     .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
///     .with_body(br#"{"value":"x"}"#.to_vec())
///     .with_timeout(Duration::from_secs(30));
///
/// assert_eq!(request.headers().get("Content-Type"), Some("application/json"));
/// assert!(!request.request_id().is_nil());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Vec<u8>,
    timeout: Option<Duration>,
    request_id: Uuid,
    cancellation: CancellationToken,
}

impl Request {
    /// Create a request with a fresh request id and its own cancellation token.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: Vec::new(),
            timeout: None,
            request_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Shorthand for `Request::new(Method::GET, url)`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Shorthand for `Request::new(Method::POST, url)`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a header value. Panics under the same conditions as
    /// [`Headers::append`].
    pub fn with_header<K>(mut self, name: K, value: impl Into<HeaderValue>) -> Self
    where
        K: IntoHeaderName,
    {
        self.headers.append(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Bound each attempt to `timeout`. An attempt that runs longer fails with
    /// a [`TransportErrorKind::Timeout`](crate::TransportErrorKind::Timeout).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a caller-provided cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Use a caller-provided request id.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target url.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable request headers, for middlewares that inject headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Stable identifier shared by every attempt.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The token governing every attempt and every delay of this operation.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::get("https://example.com");
        let b = Request::get("https://example.com");
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn test_clone_keeps_request_id_and_token() {
        let request = Request::post("https://example.com").with_body("payload");
        let cloned = request.clone();
        assert_eq!(request.request_id(), cloned.request_id());

        request.cancellation().cancel();
        assert!(cloned.cancellation().is_cancelled());
        assert_eq!(cloned.body(), b"payload");
    }

    #[test]
    fn test_shorthand_methods() {
        assert_eq!(Request::get("u").method(), Method::GET);
        assert_eq!(Request::post("u").method(), Method::POST);
    }

    #[test]
    fn test_with_header_appends() {
        let request = Request::get("u")
            .with_header(http::header::ACCEPT, HeaderValue::from_static("text/plain"))
            .with_header("accept", HeaderValue::from_static("application/json"));
        assert_eq!(request.headers().get_all("Accept").count(), 2);
    }
}
