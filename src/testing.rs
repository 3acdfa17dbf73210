//! Test doubles and assertions for code built on the pipeline.
//!
//! # Examples
//!
//! ## Scripted transport
//!
//! ```rust
//! use retryline::testing::{ScriptStep, ScriptedTransport};
//! use retryline::{Pipeline, Request, TransportErrorKind};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(ScriptedTransport::new(vec![
//!     ScriptStep::Fail(TransportErrorKind::ConnectionReset),
//!     ScriptStep::ok(),
//! ]));
//! let pipeline = Pipeline::builder(Arc::clone(&transport)).build().unwrap();
//!
//! // No retry stage: the first scripted failure is returned as-is.
//! let err = pipeline.send(Request::get("https://example.com")).await.unwrap_err();
//! assert_eq!(err.transport_kind(), Some(TransportErrorKind::ConnectionReset));
//! assert_eq!(transport.attempts(), 1);
//! # });
//! ```
//!
//! ## Assertion macros
//!
//! ```rust
//! use retryline::{assert_budget_exceeded, assert_cancelled, PipelineError, Response, StatusCode};
//!
//! let cancelled: Result<Response, PipelineError> = Err(PipelineError::cancelled("stop"));
//! assert_cancelled!(cancelled);
//!
//! let exhausted: Result<Response, PipelineError> = Err(PipelineError::RetryBudgetExceeded {
//!     attempts: 4,
//!     cause: Box::new(PipelineError::RetryableStatus {
//!         status: StatusCode::SERVICE_UNAVAILABLE,
//!     }),
//! });
//! assert_budget_exceeded!(exhausted, 4);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use http::header::RETRY_AFTER;
use http::StatusCode;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{TransportError, TransportErrorKind};
use crate::headers::Headers;
use crate::request::Request;
use crate::response::Response;
use crate::timer::Timer;
use crate::transport::Transport;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a [`ScriptedTransport`] does on one attempt.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return this response.
    Respond(Response),
    /// Fail with a transport error of this kind.
    Fail(TransportErrorKind),
    /// Never complete. Useful for timeout and cancellation tests.
    Hang,
}

impl ScriptStep {
    /// A bare `200 OK`.
    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    /// A bare response with `status`.
    pub fn status(status: StatusCode) -> Self {
        ScriptStep::Respond(Response::new(status))
    }

    /// A `429` carrying `Retry-After: <seconds>`.
    pub fn throttled(seconds: u64) -> Self {
        ScriptStep::Respond(
            Response::new(StatusCode::TOO_MANY_REQUESTS).with_header(RETRY_AFTER, seconds),
        )
    }
}

/// What a [`ScriptedTransport`] saw on one attempt.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    /// The request id of the attempt.
    pub request_id: Uuid,
    /// Headers as they reached the transport.
    pub headers: Headers,
    /// When the attempt reached the transport, on the tokio clock.
    pub at: Instant,
}

/// [`Transport`] that plays back a fixed script, one step per attempt.
///
/// Once the script runs out the last step repeats. Every attempt is
/// recorded before its step is played.
#[derive(Debug)]
pub struct ScriptedTransport {
    steps: Vec<ScriptStep>,
    recorded: Mutex<Vec<RecordedAttempt>>,
}

impl ScriptedTransport {
    /// Play `steps` in order.
    ///
    /// # Panics
    ///
    /// Panics if `steps` is empty.
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        assert!(!steps.is_empty(), "a scripted transport needs at least one step");
        Self {
            steps,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Play `step` on every attempt.
    pub fn always(step: ScriptStep) -> Self {
        Self::new(vec![step])
    }

    /// Number of attempts so far.
    pub fn attempts(&self) -> usize {
        lock(&self.recorded).len()
    }

    /// Snapshot of every attempt so far.
    pub fn recorded(&self) -> Vec<RecordedAttempt> {
        lock(&self.recorded).clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        let step = {
            let mut recorded = lock(&self.recorded);
            let idx = recorded.len().min(self.steps.len() - 1);
            recorded.push(RecordedAttempt {
                request_id: request.request_id(),
                headers: request.headers().clone(),
                at: Instant::now(),
            });
            self.steps[idx].clone()
        };

        Box::pin(async move {
            match step {
                ScriptStep::Respond(response) => Ok(response),
                ScriptStep::Fail(kind) => Err(TransportError::new(kind, "scripted failure")),
                ScriptStep::Hang => futures::future::pending().await,
            }
        })
    }
}

/// [`Timer`] that counts the timers it creates and sleeps on the tokio clock.
#[derive(Debug, Default)]
pub struct CountingTimer {
    created: AtomicUsize,
    durations: Mutex<Vec<Duration>>,
}

impl CountingTimer {
    /// A timer with no recorded sleeps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Requested durations, in order.
    pub fn durations(&self) -> Vec<Duration> {
        lock(&self.durations).clone()
    }
}

impl Timer for CountingTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.created.fetch_add(1, Ordering::SeqCst);
        lock(&self.durations).push(duration);
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Assert that a pipeline result is a cancellation.
///
/// # Example
///
/// ```rust
/// use retryline::{assert_cancelled, PipelineError, Response};
///
/// let result: Result<Response, PipelineError> = Err(PipelineError::cancelled("stop"));
/// assert_cancelled!(result);
/// ```
#[macro_export]
macro_rules! assert_cancelled {
    ($result:expr) => {
        match $result {
            Err(ref err) if err.is_cancelled() => {}
            other => panic!("Expected Cancelled, got {:?}", other),
        }
    };
}

/// Assert that a pipeline result ran out of retries after `attempts` attempts.
///
/// # Example
///
/// ```rust
/// use retryline::{assert_budget_exceeded, PipelineError, Response, StatusCode};
///
/// let result: Result<Response, PipelineError> = Err(PipelineError::RetryBudgetExceeded {
///     attempts: 2,
///     cause: Box::new(PipelineError::RetryableStatus { status: StatusCode::INTERNAL_SERVER_ERROR }),
/// });
/// assert_budget_exceeded!(result, 2);
/// ```
#[macro_export]
macro_rules! assert_budget_exceeded {
    ($result:expr, $attempts:expr) => {
        match $result {
            Err($crate::PipelineError::RetryBudgetExceeded { attempts, .. }) => {
                assert_eq!(attempts, $attempts, "unexpected attempt count");
            }
            other => panic!("Expected RetryBudgetExceeded, got {:?}", other),
        }
    };
}
