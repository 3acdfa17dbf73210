//! Retry strategies and the retry executor.
//!
//! Strategies are plain data: they look at the outcome of an attempt and the
//! per-operation [`RetryState`] and return a [`RetryDecision`]. The
//! [`RetryPolicy`] middleware owns the loop. It asks its strategies in order,
//! waits on the cancellable delay primitive and re-runs the rest of the chain.
//!
//! # Quick Start
//!
//! ```rust
//! use retryline::config::RetryOptions;
//! use retryline::retry::RetryPolicy;
//! use retryline::testing::{ScriptStep, ScriptedTransport};
//! use retryline::{assert_budget_exceeded, Pipeline, Request, StatusCode};
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::from_options(&RetryOptions {
//!     max_retries: 2,
//!     retry_delay_in_ms: 1,
//!     ..RetryOptions::default()
//! });
//! let transport = ScriptedTransport::always(ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE));
//! let pipeline = Pipeline::builder(transport)
//!     .with(RetryPolicy::NAME, policy)
//!     .build()
//!     .unwrap();
//!
//! let result = pipeline.send(Request::get("https://example.com")).await;
//! assert_budget_exceeded!(result, 3);
//! # });
//! ```
//!
//! # Strategies
//!
//! - **Exponential**: retryable statuses and transient transport failures,
//!   delay doubling from `retry_delay` up to `max_retry_delay`
//! - **System error**: the exponential formula, transport failures only
//! - **Throttling**: `429` responses carrying a numeric retry-after hint

mod jitter;
mod policy;
mod state;
mod strategy;

pub use jitter::JitterStrategy;
pub use policy::RetryPolicy;
pub use state::{AttemptOutcome, RetryEvent, RetryState};
pub use strategy::{
    evaluate, is_retryable_status, parse_retry_after, ExponentialBackoff, RetryDecision,
    RetryStrategy, SystemErrorRetry, ThrottlingRetry, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_RETRY_DELAY, DEFAULT_MAX_THROTTLE_DELAY, DEFAULT_RETRY_DELAY,
    RETRYABLE_STATUS_CODES, RETRY_AFTER_MS, TOO_MANY_REQUESTS, X_MS_RETRY_AFTER_MS,
};

#[cfg(test)]
mod tests;
