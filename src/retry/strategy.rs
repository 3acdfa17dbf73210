//! Retry strategies: pure decision functions over one attempt's outcome.

use std::time::Duration;

use http::header::{AsHeaderName, RETRY_AFTER};
use http::StatusCode;

use crate::error::PipelineError;
use crate::headers::Headers;
use crate::request::Request;
use crate::retry::jitter::JitterStrategy;
use crate::retry::state::RetryState;
use crate::Outcome;

/// Statuses the exponential strategy treats as transient.
pub const RETRYABLE_STATUS_CODES: [StatusCode; 6] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Status code servers use to signal throttling.
pub const TOO_MANY_REQUESTS: StatusCode = StatusCode::TOO_MANY_REQUESTS;

/// Default base delay of the exponential strategy.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Default ceiling of the exponential strategy.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(64_000);
/// Default retry budget (retries, not attempts).
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default ceiling on a server-requested throttling delay.
pub const DEFAULT_MAX_THROTTLE_DELAY: Duration = Duration::from_millis(180_000);

/// Millisecond retry-after header, checked first.
pub const RETRY_AFTER_MS: &str = "retry-after-ms";
/// Vendor millisecond retry-after header, checked after [`RETRY_AFTER_MS`].
pub const X_MS_RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

/// Returns true for statuses in [`RETRYABLE_STATUS_CODES`].
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

fn header_amount<K: AsHeaderName>(headers: &Headers, name: K) -> Option<u64> {
    headers.get(name)?.trim().parse().ok()
}

/// Server-requested delay from a response's retry-after headers.
///
/// Millisecond headers win over `Retry-After`. Values must be non-negative
/// integers; anything else is skipped, so an HTTP-date `Retry-After` yields
/// `None`.
///
/// # Examples
///
/// ```rust
/// use retryline::http::header::RETRY_AFTER;
/// use retryline::retry::parse_retry_after;
/// use retryline::{HeaderValue, Headers};
/// use std::time::Duration;
///
/// let mut headers = Headers::new();
/// headers.insert(RETRY_AFTER, 2u64);
/// assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
///
/// headers.insert("x-ms-retry-after-ms", 250u64);
/// assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(250)));
///
/// let mut headers = Headers::new();
/// headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
/// assert_eq!(parse_retry_after(&headers), None);
/// ```
pub fn parse_retry_after(headers: &Headers) -> Option<Duration> {
    header_amount(headers, RETRY_AFTER_MS)
        .or_else(|| header_amount(headers, X_MS_RETRY_AFTER_MS))
        .map(Duration::from_millis)
        .or_else(|| header_amount(headers, RETRY_AFTER).map(Duration::from_secs))
}

/// A strategy's verdict on one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Retry(Duration),
    /// Do not retry; propagate the outcome as-is.
    NoRetry,
    /// The outcome is retryable but the strategy's retry budget is spent.
    Exhausted,
    /// The outcome is outside this strategy's concern.
    Abstain,
}

impl RetryDecision {
    /// Returns true for every decision except [`RetryDecision::Abstain`].
    pub fn is_decisive(&self) -> bool {
        !matches!(self, RetryDecision::Abstain)
    }
}

/// Exponential backoff over retryable statuses and system errors.
///
/// Retry `k` (1 for the first retry) waits
/// `min(max_retry_delay, retry_delay * 2^(k-1))`, scaled by the jitter and
/// capped at `max_retry_delay` again.
///
/// # Examples
///
/// ```rust
/// use retryline::retry::{ExponentialBackoff, JitterStrategy};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::new()
///     .with_retry_delay(Duration::from_millis(100))
///     .with_max_retry_delay(Duration::from_millis(500))
///     .with_jitter(JitterStrategy::None);
///
/// assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
/// assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(200));
/// assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(400));
/// assert_eq!(backoff.delay_for_retry(4), Duration::from_millis(500)); // capped
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    retry_delay: Duration,
    max_retry_delay: Duration,
    max_retries: u32,
    ignore_system_errors: bool,
    ignore_http_status_codes: bool,
    jitter: JitterStrategy,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl ExponentialBackoff {
    /// Backoff with 1s base, 64s ceiling, 3 retries and ±20% jitter.
    pub fn new() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            ignore_system_errors: false,
            ignore_http_status_codes: false,
            jitter: JitterStrategy::default(),
        }
    }

    /// Set the base delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        if self.max_retry_delay < delay {
            self.max_retry_delay = delay;
        }
        self
    }

    /// Set the delay ceiling. Never below the base delay.
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay.max(self.retry_delay);
        self
    }

    /// Set how many retries this strategy allows.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Stop governing transport failures.
    pub fn ignore_system_errors(mut self, ignore: bool) -> Self {
        self.ignore_system_errors = ignore;
        self
    }

    /// Stop governing retryable HTTP statuses.
    pub fn ignore_http_status_codes(mut self, ignore: bool) -> Self {
        self.ignore_http_status_codes = ignore;
        self
    }

    /// Set the jitter applied to each delay.
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Base delay.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Delay ceiling.
    pub fn max_retry_delay(&self) -> Duration {
        self.max_retry_delay
    }

    /// Retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// Capped delay for retry `retry` before jitter.
    pub fn base_delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.retry_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_retry_delay)
    }

    /// Jittered delay for retry `retry`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.jitter
            .apply(self.base_delay_for_retry(retry), self.max_retry_delay)
    }

    fn governs(&self, outcome: &Outcome) -> bool {
        match outcome {
            Ok(response) => {
                !self.ignore_http_status_codes && is_retryable_status(response.status())
            }
            Err(PipelineError::Transport(err)) => {
                !self.ignore_system_errors && err.kind().is_system_error()
            }
            Err(_) => false,
        }
    }

    fn decide(&self, outcome: &Outcome, state: &RetryState) -> RetryDecision {
        if matches!(outcome, Err(err) if err.is_cancelled()) {
            return RetryDecision::NoRetry;
        }
        if !self.governs(outcome) {
            return RetryDecision::Abstain;
        }
        if state.attempts() > self.max_retries {
            return RetryDecision::Exhausted;
        }
        RetryDecision::Retry(self.delay_for_retry(state.attempts().max(1)))
    }
}

/// Exponential backoff restricted to transport failures.
///
/// HTTP statuses are never considered, whatever the wrapped backoff says.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemErrorRetry {
    backoff: ExponentialBackoff,
}

impl SystemErrorRetry {
    /// Retry transport failures using `backoff`'s delay formula and budget.
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            backoff: backoff
                .ignore_http_status_codes(true)
                .ignore_system_errors(false),
        }
    }

    /// The underlying backoff.
    pub fn backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }
}

impl Default for SystemErrorRetry {
    fn default() -> Self {
        Self::new(ExponentialBackoff::new())
    }
}

/// Honors server throttling hints on `429` responses.
///
/// The server delay is used verbatim, without growth or jitter, capped at
/// `max_delay`. Responses without a parseable hint are left to later
/// strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlingRetry {
    max_delay: Duration,
}

impl ThrottlingRetry {
    /// Throttling strategy with the default 180s ceiling.
    pub fn new() -> Self {
        Self {
            max_delay: DEFAULT_MAX_THROTTLE_DELAY,
        }
    }

    /// Set the ceiling on a server-requested delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Ceiling on a server-requested delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn decide(&self, outcome: &Outcome) -> RetryDecision {
        match outcome {
            Ok(response) if response.status() == TOO_MANY_REQUESTS => {
                match parse_retry_after(response.headers()) {
                    Some(delay) => RetryDecision::Retry(delay.min(self.max_delay)),
                    None => RetryDecision::Abstain,
                }
            }
            _ => RetryDecision::Abstain,
        }
    }
}

impl Default for ThrottlingRetry {
    fn default() -> Self {
        Self::new()
    }
}

/// The closed set of retry strategies.
///
/// Strategies hold configuration only; all per-operation data lives in
/// [`RetryState`], so one strategy value can serve concurrent requests.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// See [`ExponentialBackoff`].
    Exponential(ExponentialBackoff),
    /// See [`SystemErrorRetry`].
    SystemError(SystemErrorRetry),
    /// See [`ThrottlingRetry`].
    Throttling(ThrottlingRetry),
}

impl RetryStrategy {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RetryStrategy::Exponential(_) => "exponential",
            RetryStrategy::SystemError(_) => "system_error",
            RetryStrategy::Throttling(_) => "throttling",
        }
    }

    /// Decide whether the attempt that produced `outcome` should be retried.
    pub fn decide(&self, _request: &Request, outcome: &Outcome, state: &RetryState) -> RetryDecision {
        match self {
            RetryStrategy::Exponential(backoff) => backoff.decide(outcome, state),
            RetryStrategy::SystemError(system) => system.backoff.decide(outcome, state),
            RetryStrategy::Throttling(throttling) => throttling.decide(outcome),
        }
    }
}

impl From<ExponentialBackoff> for RetryStrategy {
    fn from(backoff: ExponentialBackoff) -> Self {
        RetryStrategy::Exponential(backoff)
    }
}

impl From<SystemErrorRetry> for RetryStrategy {
    fn from(system: SystemErrorRetry) -> Self {
        RetryStrategy::SystemError(system)
    }
}

impl From<ThrottlingRetry> for RetryStrategy {
    fn from(throttling: ThrottlingRetry) -> Self {
        RetryStrategy::Throttling(throttling)
    }
}

/// Evaluate `strategies` in order; the first decisive answer wins.
///
/// Returns the decision and the strategy that made it, or
/// `(NoRetry, None)` when every strategy abstains.
pub fn evaluate<'s>(
    strategies: &'s [RetryStrategy],
    request: &Request,
    outcome: &Outcome,
    state: &RetryState,
) -> (RetryDecision, Option<&'s RetryStrategy>) {
    strategies
        .iter()
        .map(|strategy| (strategy.decide(request, outcome, state), strategy))
        .find(|(decision, _)| decision.is_decisive())
        .map_or((RetryDecision::NoRetry, None), |(decision, strategy)| {
            (decision, Some(strategy))
        })
}
