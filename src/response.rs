//! Response returned by a transport.

use http::header::{HeaderValue, IntoHeaderName};
use http::StatusCode;

use crate::headers::Headers;

/// HTTP response produced by one attempt.
///
/// # Examples
///
/// ```rust
/// use retryline::http::header::RETRY_AFTER;
/// use retryline::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::TOO_MANY_REQUESTS).with_header(RETRY_AFTER, 2u64);
/// assert_eq!(response.status(), 429);
/// assert_eq!(response.headers().get("retry-after"), Some("2"));
/// assert!(!response.is_success());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Create a response with the given status, no headers and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
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

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, returning the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
