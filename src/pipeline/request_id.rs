//! Stamps each request with a client request id header.

use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};

use crate::error::ConfigError;
use crate::pipeline::{Middleware, Next};
use crate::request::Request;
use crate::Outcome;

/// Header carrying the client request id when none is configured.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Sets the request id header from [`Request::request_id`] unless the caller
/// already set it.
///
/// Placed outside the retry stage, the header is written once and every
/// attempt carries the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequestId {
    header_name: HeaderName,
}

impl ClientRequestId {
    /// Name of this stage in the default pipeline.
    pub const NAME: &'static str = "client-request-id";

    /// Use [`DEFAULT_REQUEST_ID_HEADER`].
    pub fn new() -> Self {
        Self::with_header_name(HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER))
    }

    /// Use a custom header name.
    pub fn with_header_name(header_name: HeaderName) -> Self {
        Self { header_name }
    }

    /// Use a header name read from configuration.
    pub fn parse_header_name(header_name: &str) -> Result<Self, ConfigError> {
        HeaderName::from_bytes(header_name.as_bytes())
            .map(Self::with_header_name)
            .map_err(|_| ConfigError::InvalidHeaderName {
                name: header_name.to_owned(),
            })
    }

    /// The header this middleware writes.
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }
}

impl Default for ClientRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for ClientRequestId {
    fn handle<'a>(&'a self, request: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        if !request.headers().contains(&self.header_name) {
            let id = request.request_id().to_string();
            if let Ok(value) = HeaderValue::from_str(&id) {
                request.headers_mut().insert(self.header_name.clone(), value);
            }
        }
        next.run(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptStep, ScriptedTransport};
    use crate::Pipeline;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sets_header_from_request_id() {
        let transport = Arc::new(ScriptedTransport::always(ScriptStep::ok()));
        let pipeline = Pipeline::builder(Arc::clone(&transport))
            .with(ClientRequestId::NAME, ClientRequestId::new())
            .build()
            .unwrap();

        let request = Request::get("https://example.com");
        let id = request.request_id().to_string();
        pipeline.send(request).await.unwrap();

        assert_eq!(
            transport.recorded()[0].headers.get(DEFAULT_REQUEST_ID_HEADER),
            Some(id.as_str())
        );
    }

    #[tokio::test]
    async fn test_keeps_caller_supplied_value() {
        let transport = Arc::new(ScriptedTransport::always(ScriptStep::ok()));
        let pipeline = Pipeline::builder(Arc::clone(&transport))
            .with(
                ClientRequestId::NAME,
                ClientRequestId::parse_header_name("X-Correlation-Id").unwrap(),
            )
            .build()
            .unwrap();

        pipeline
            .send(
                Request::get("https://example.com")
                    .with_header("x-correlation-id", HeaderValue::from_static("abc")),
            )
            .await
            .unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded[0].headers.get("x-correlation-id"), Some("abc"));
        assert_eq!(recorded[0].headers.get_all("x-correlation-id").count(), 1);
        assert!(!recorded[0].headers.contains(DEFAULT_REQUEST_ID_HEADER));
    }

    #[test]
    fn test_invalid_configured_header_name_is_rejected() {
        assert_eq!(
            ClientRequestId::parse_header_name("bad header"),
            Err(ConfigError::InvalidHeaderName {
                name: "bad header".to_owned()
            })
        );
        assert_eq!(
            ClientRequestId::parse_header_name("X-Request-Id")
                .unwrap()
                .header_name()
                .as_str(),
            "x-request-id"
        );
    }
}
