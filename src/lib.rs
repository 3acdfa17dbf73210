//! # Retryline
//!
//! Composable, cancellation-aware retry pipeline for async request clients.
//!
//! A [`Pipeline`] is an ordered chain of named [`Middleware`](pipeline::Middleware)
//! stages that ends in a [`Transport`]. The [`RetryPolicy`] stage re-runs the
//! rest of the chain while its strategies ask for a retry:
//!
//! - **Exponential backoff** for retryable statuses and transient transport
//!   failures, with jitter and a delay ceiling
//! - **System errors only**, the same formula restricted to transport failures
//! - **Throttling**, honoring `Retry-After` style hints on `429` responses
//!
//! Every wait is raced against the request's
//! [`CancellationToken`], and the attempt budget is enforced by the executor
//! regardless of what the strategies say.
//!
//! ## Quick Example
//!
//! ```rust
//! use retryline::config::PipelineOptions;
//! use retryline::{transport_fn, Pipeline, Request, Response, StatusCode};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let calls = Arc::new(AtomicU32::new(0));
//! let counter = Arc::clone(&calls);
//! let transport = transport_fn(move |_request: Request| {
//!     let n = counter.fetch_add(1, Ordering::SeqCst);
//!     async move {
//!         if n == 0 {
//!             let throttled = Response::new(StatusCode::TOO_MANY_REQUESTS);
//!             Ok(throttled.with_header("retry-after-ms", 10u64))
//!         } else {
//!             Ok(Response::new(StatusCode::OK))
//!         }
//!     }
//! });
//!
//! let pipeline = Pipeline::from_options(transport, &PipelineOptions::default()).unwrap();
//! let response = pipeline.send(Request::get("https://example.com")).await.unwrap();
//!
//! assert_eq!(response.status(), 200);
//! assert_eq!(calls.load(Ordering::SeqCst), 2);
//! # });
//! ```
//!
//! ## Features
//!
//! - `jitter` (default): randomized backoff delays via `rand`
//! - `tracing` (default): spans, retry events and the logging middleware
//! - `serde` (default): deserializable option structs

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod delay;
pub mod error;
pub mod headers;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod retry;
pub mod testing;
pub mod timer;
pub mod transport;

/// Result of one attempt, or of a whole operation.
pub type Outcome = Result<Response, PipelineError>;

// Re-exports
pub use config::{LogOptions, PipelineOptions, RetryOptions};
pub use delay::{cancellable, delay, delay_with, DelayOptions};
pub use error::{
    BoxError, ConfigError, PipelineError, PipelineErrorCode, TransportError, TransportErrorKind,
};
pub use headers::Headers;
pub use http;
pub use http::header::{HeaderName, HeaderValue};
pub use http::{Method, StatusCode};
pub use pipeline::{Middleware, Next, Pipeline, PipelineBuilder};
pub use request::Request;
pub use response::Response;
pub use retry::{RetryDecision, RetryPolicy, RetryStrategy};
pub use timer::{Timer, TokioTimer};
pub use tokio_util::sync::CancellationToken;
pub use transport::{transport_fn, FnTransport, Transport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PipelineOptions, RetryOptions};
    pub use crate::error::{PipelineError, TransportError, TransportErrorKind};
    pub use crate::pipeline::{Middleware, Next, Pipeline};
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::retry::{ExponentialBackoff, RetryPolicy, SystemErrorRetry, ThrottlingRetry};
    pub use crate::transport::{transport_fn, Transport};
    pub use crate::Outcome;
    pub use http::{Method, StatusCode};
    pub use tokio_util::sync::CancellationToken;
}
