//! Ordered middleware chain terminating in a [`Transport`].
//!
//! Each middleware receives the request and a [`Next`] continuation for the
//! rest of the chain. The first middleware added sees the request first and
//! the outcome last, so it wraps everything added after it.
//!
//! # Examples
//!
//! ```rust
//! use futures::future::BoxFuture;
//! use retryline::pipeline::{Middleware, Next};
//! use retryline::http::header::USER_AGENT;
//! use retryline::{transport_fn, HeaderValue, Outcome, Pipeline, Request, Response, StatusCode};
//!
//! #[derive(Debug)]
//! struct UserAgent(&'static str);
//!
//! impl Middleware for UserAgent {
//!     fn handle<'a>(&'a self, request: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
//!         request.headers_mut().insert(USER_AGENT, HeaderValue::from_static(self.0));
//!         next.run(request)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let transport = transport_fn(|request: Request| async move {
//!     let agent = request.headers().get("user-agent").unwrap_or_default().to_owned();
//!     Ok(Response::new(StatusCode::OK).with_body(agent))
//! });
//! let pipeline = Pipeline::builder(transport)
//!     .with("user-agent", UserAgent("retryline-demo/1.0"))
//!     .build()
//!     .unwrap();
//!
//! let response = pipeline.send(Request::get("https://example.com")).await.unwrap();
//! assert_eq!(response.body(), b"retryline-demo/1.0");
//! # });
//! ```

mod builder;
#[cfg(feature = "tracing")]
mod log;
mod request_id;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::PipelineOptions;
use crate::error::{ConfigError, PipelineError, TransportError, TransportErrorKind};
use crate::request::Request;
use crate::response::Response;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::Outcome;

pub use builder::PipelineBuilder;
#[cfg(feature = "tracing")]
pub use log::{LogPolicy, Sanitizer, DEFAULT_ALLOWED_HEADER_NAMES, DEFAULT_ALLOWED_QUERY_PARAMETERS, REDACTED};
pub use request_id::{ClientRequestId, DEFAULT_REQUEST_ID_HEADER};

/// Message carried by [`PipelineError::Cancelled`] when an operation is aborted.
pub const OPERATION_ABORTED: &str = "the operation was aborted";

/// One unit of the request-processing chain.
///
/// Implementations may inspect or modify the request before calling
/// [`Next::run`], and inspect the outcome afterwards. Calling `next` zero
/// times short-circuits the chain; the retry policy calls it once per attempt.
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process `request`, delegating to the rest of the chain through `next`.
    fn handle<'a>(&'a self, request: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn handle<'a>(&'a self, request: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        (**self).handle(request, next)
    }
}

/// A named middleware in the chain.
#[derive(Debug, Clone)]
pub(crate) struct Stage {
    pub(crate) name: String,
    pub(crate) middleware: Arc<dyn Middleware>,
}

/// Continuation for the remainder of the chain.
///
/// `Next` is a cursor into the pipeline's stages, so copying it is cheap.
/// [`Next::run`] consumes the value it is called on; a middleware that needs
/// one continuation per attempt copies it before each call.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Stage],
    transport: &'a dyn Transport,
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field(
                "remaining",
                &self.stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<'a> Next<'a> {
    /// Run the rest of the chain, ending in the transport.
    pub fn run<'r>(self, request: &'r mut Request) -> BoxFuture<'r, Outcome>
    where
        'a: 'r,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.middleware.handle(
                request,
                Next {
                    stages: rest,
                    transport: self.transport,
                },
            ),
            None => Box::pin(dispatch(self.transport, request)),
        }
    }
}

/// Terminal stage: one transport call, bounded by the request timeout and
/// raced against the request's cancellation token.
async fn dispatch(transport: &dyn Transport, request: &Request) -> Outcome {
    let send = async {
        match request.timeout() {
            Some(limit) => match tokio::time::timeout(limit, transport.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::new(
                    TransportErrorKind::Timeout,
                    format!("attempt timed out after {}ms", limit.as_millis()),
                )),
            },
            None => transport.send(request).await,
        }
    };

    tokio::select! {
        biased;
        _ = request.cancellation().cancelled() => Err(PipelineError::cancelled(OPERATION_ABORTED)),
        result = send => result.map_err(PipelineError::from),
    }
}

/// A reusable, immutable middleware chain bound to a transport.
///
/// Cloning is cheap and clones share middlewares and transport, so one
/// pipeline can serve many concurrent requests.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Stage]>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.middleware_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Start an empty chain over `transport`.
    pub fn builder(transport: impl Transport + 'static) -> PipelineBuilder {
        PipelineBuilder::new(Arc::new(transport))
    }

    /// The standard chain: client request id, retry, then per-attempt logging.
    ///
    /// The retry stage consults the throttling strategy first and falls back
    /// to exponential backoff. Fails if the configured request id header name
    /// is not a valid header name.
    pub fn from_options(
        transport: impl Transport + 'static,
        options: &PipelineOptions,
    ) -> Result<Self, ConfigError> {
        let request_id = ClientRequestId::parse_header_name(&options.request_id_header_name)?;

        #[cfg_attr(not(feature = "tracing"), allow(unused_mut))]
        let mut stages = vec![
            Stage {
                name: ClientRequestId::NAME.to_owned(),
                middleware: Arc::new(request_id),
            },
            Stage {
                name: RetryPolicy::NAME.to_owned(),
                middleware: Arc::new(RetryPolicy::from_options(&options.retry)),
            },
        ];
        #[cfg(feature = "tracing")]
        stages.push(Stage {
            name: LogPolicy::NAME.to_owned(),
            middleware: Arc::new(LogPolicy::from_options(&options.logging)),
        });

        Ok(Self::from_parts(stages, Arc::new(transport)))
    }

    pub(crate) fn from_parts(stages: Vec<Stage>, transport: Arc<dyn Transport>) -> Self {
        Self {
            stages: stages.into(),
            transport,
        }
    }

    /// Names of the middlewares, outermost first.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name.as_str()).collect()
    }

    /// A builder seeded with this pipeline's stages and transport, for
    /// deriving a customized chain.
    pub fn to_builder(&self) -> PipelineBuilder {
        PipelineBuilder::from_stages(self.stages.to_vec(), Arc::clone(&self.transport))
    }

    /// Send `request` through the chain.
    ///
    /// Fails with [`PipelineError::Cancelled`] without touching any
    /// middleware if the request's token is already cancelled.
    pub async fn send(&self, mut request: Request) -> Result<Response, PipelineError> {
        if request.cancellation().is_cancelled() {
            return Err(PipelineError::cancelled(OPERATION_ABORTED));
        }

        let next = Next {
            stages: &self.stages[..],
            transport: self.transport.as_ref(),
        };

        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "pipeline.send",
            request_id = %request.request_id(),
            method = %request.method(),
        );

        let outcome = next.run(&mut request);

        #[cfg(feature = "tracing")]
        let outcome = {
            use tracing::Instrument as _;
            outcome.instrument(span)
        };

        outcome.await
    }
}
