//! Per-operation retry bookkeeping.

use std::time::Duration;

use http::{Method, StatusCode};
use tokio::time::Instant;

/// Counters for one logical operation.
///
/// Created fresh by the retry executor for every top-level request and
/// dropped when the operation terminates. Never shared between requests.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    total_delay: Duration,
    last_delay: Option<Duration>,
    retry_after_hint: Option<Duration>,
    started: Instant,
}

impl RetryState {
    /// State for an operation that has not made any attempt yet.
    pub fn new() -> Self {
        Self {
            attempts: 0,
            total_delay: Duration::ZERO,
            last_delay: None,
            retry_after_hint: None,
            started: Instant::now(),
        }
    }

    /// State as if `attempts` attempts had already completed. Mostly useful
    /// for exercising strategies directly.
    pub fn after_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::new()
        }
    }

    /// Attempts made so far, including the first.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sum of all delays slept between attempts.
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// The most recent delay slept, if any.
    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    /// Largest server retry-after hint observed so far.
    pub fn retry_after_hint(&self) -> Option<Duration> {
        self.retry_after_hint
    }

    /// Time since the operation started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn record_delay(&mut self, delay: Duration) {
        self.total_delay = self.total_delay.saturating_add(delay);
        self.last_delay = Some(delay);
    }

    /// The hint only grows; a smaller later hint is ignored.
    pub(crate) fn observe_retry_after(&mut self, hint: Duration) {
        self.retry_after_hint = Some(self.retry_after_hint.map_or(hint, |prev| prev.max(hint)));
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the last attempt produced, in a form cheap to hand to hooks.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    /// A response with this status.
    Status(StatusCode),
    /// A failure with this description.
    Failure(&'a crate::error::PipelineError),
}

/// Information about a retry decision, passed to
/// [`RetryPolicy::on_retry`](crate::retry::RetryPolicy::on_retry) hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a> {
    /// Which attempt just completed (1-indexed).
    pub attempt: u32,
    /// Method of the request being retried.
    pub method: &'a Method,
    /// Url of the request being retried.
    pub url: &'a str,
    /// The outcome of that attempt.
    pub outcome: AttemptOutcome<'a>,
    /// Delay before the next attempt, or `None` when the executor gives up.
    pub next_delay: Option<Duration>,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}
