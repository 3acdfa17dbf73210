//! Cancellable waits.
//!
//! [`delay`] is the only place the retry subsystem suspends on a clock. The
//! cancellation observer it registers lives inside a single `select!`, so it
//! is dropped on the timeout path, the cancellation path and when the caller
//! drops the future.
//!
//! # Examples
//!
//! ```rust
//! use retryline::delay::{delay, DelayOptions};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let value = delay(Duration::from_millis(1), 7, &DelayOptions::new()).await.unwrap();
//! assert_eq!(value, 7);
//!
//! let token = CancellationToken::new();
//! token.cancel();
//! let options = DelayOptions::new()
//!     .with_cancellation(token)
//!     .with_cancel_message("shutting down");
//! let err = delay(Duration::from_secs(60), (), &options).await.unwrap_err();
//! assert!(err.is_cancelled());
//! assert_eq!(err.to_string(), "shutting down");
//! # });
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::timer::{Timer, TokioTimer};

/// Message used when no cancel message is configured.
pub const DEFAULT_CANCEL_MESSAGE: &str = "the delay was aborted";

/// Cancellation settings for [`delay`] and [`cancellable`].
#[derive(Debug, Clone, Default)]
pub struct DelayOptions {
    cancellation: Option<CancellationToken>,
    cancel_message: Option<String>,
}

impl DelayOptions {
    /// Options with no cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the wait when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Message carried by the resulting [`PipelineError::Cancelled`].
    pub fn with_cancel_message(mut self, message: impl Into<String>) -> Self {
        self.cancel_message = Some(message.into());
        self
    }

    /// The configured token, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// The message used on cancellation.
    pub fn cancel_message(&self) -> &str {
        self.cancel_message
            .as_deref()
            .unwrap_or(DEFAULT_CANCEL_MESSAGE)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn cancelled_error(&self) -> PipelineError {
        PipelineError::cancelled(self.cancel_message())
    }
}

/// Race `future` against the cancellation token in `options`.
///
/// Fails immediately, without polling `future`, if the token is already
/// cancelled. When the token fires first, `future` is dropped.
pub async fn cancellable<F>(future: F, options: &DelayOptions) -> Result<F::Output, PipelineError>
where
    F: Future,
{
    let Some(token) = options.cancellation() else {
        return Ok(future.await);
    };
    if token.is_cancelled() {
        return Err(options.cancelled_error());
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(options.cancelled_error()),
        output = future => Ok(output),
    }
}

/// Wait for `duration` on the tokio clock, then yield `value`.
pub async fn delay<T>(duration: Duration, value: T, options: &DelayOptions) -> Result<T, PipelineError> {
    delay_with(&TokioTimer, duration, value, options).await
}

/// Wait for `duration` on `timer`, then yield `value`.
///
/// No timer is created when the token is already cancelled.
pub async fn delay_with<T>(
    timer: &dyn Timer,
    duration: Duration,
    value: T,
    options: &DelayOptions,
) -> Result<T, PipelineError> {
    if options.is_cancelled() {
        return Err(options.cancelled_error());
    }

    cancellable(timer.sleep(duration), options).await?;
    Ok(value)
}
