//! The retry executor middleware.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::config::RetryOptions;
use crate::delay::{delay_with, DelayOptions};
use crate::error::PipelineError;
use crate::pipeline::{Middleware, Next, OPERATION_ABORTED};
use crate::request::Request;
use crate::retry::state::{AttemptOutcome, RetryEvent, RetryState};
use crate::retry::strategy::{
    evaluate, ExponentialBackoff, RetryDecision, RetryStrategy, SystemErrorRetry,
    ThrottlingRetry, DEFAULT_MAX_RETRIES, DEFAULT_MAX_THROTTLE_DELAY,
};
use crate::timer::{Timer, TokioTimer};
use crate::Outcome;

type RetryHook = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Middleware that re-runs the rest of the chain while its strategies ask
/// for a retry.
///
/// Strategies are consulted in order after every attempt; the first one that
/// does not abstain decides. The executor enforces its own attempt budget of
/// `max_retries + 1` and caps every delay at `max_delay`, independently of
/// what the strategies return. A cancelled outcome is never retried, and a
/// cancellation during the backoff wait ends the operation before the next
/// attempt.
///
/// When attempts run out while the last outcome is still retryable, the
/// operation fails with [`PipelineError::RetryBudgetExceeded`] whose cause is
/// the last transport error, or a [`PipelineError::RetryableStatus`] for a
/// retryable response.
///
/// # Examples
///
/// ```rust
/// use retryline::config::RetryOptions;
/// use retryline::retry::RetryPolicy;
/// use retryline::testing::{ScriptStep, ScriptedTransport};
/// use retryline::{Pipeline, Request, StatusCode};
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new(vec![
///     ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE),
///     ScriptStep::ok(),
/// ]);
/// let policy = RetryPolicy::from_options(&RetryOptions {
///     retry_delay_in_ms: 10,
///     ..RetryOptions::default()
/// });
/// let pipeline = Pipeline::builder(transport)
///     .with(RetryPolicy::NAME, policy)
///     .build()
///     .unwrap();
///
/// let response = pipeline.send(Request::get("https://example.com")).await.unwrap();
/// assert_eq!(response.status(), 200);
/// # });
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    strategies: Vec<RetryStrategy>,
    max_retries: u32,
    max_delay: Duration,
    timer: Arc<dyn Timer>,
    on_retry: Option<RetryHook>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategies", &self.strategies)
            .field("max_retries", &self.max_retries)
            .field("max_delay", &self.max_delay)
            .field("timer", &self.timer)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl Default for RetryPolicy {
    /// Throttling first, then exponential backoff, with default options.
    fn default() -> Self {
        Self::from_options(&RetryOptions::default())
    }
}

impl RetryPolicy {
    /// Name of this stage in the default pipeline.
    pub const NAME: &'static str = "retry";

    /// Executor over `strategies`, in priority order.
    pub fn new(strategies: Vec<RetryStrategy>) -> Self {
        Self {
            strategies,
            max_retries: DEFAULT_MAX_RETRIES,
            max_delay: DEFAULT_MAX_THROTTLE_DELAY,
            timer: Arc::new(TokioTimer),
            on_retry: None,
        }
    }

    /// Throttling then exponential backoff, both configured from `options`.
    ///
    /// The executor ceiling is the larger of the two strategy ceilings.
    pub fn from_options(options: &RetryOptions) -> Self {
        let throttling = options.throttling();
        let backoff = options.exponential_backoff();
        let max_delay = throttling.max_delay().max(backoff.max_retry_delay());

        Self::new(vec![throttling.into(), backoff.into()])
            .with_max_retries(options.max_retries)
            .with_max_delay(max_delay)
    }

    /// Exponential backoff only.
    pub fn exponential(options: &RetryOptions) -> Self {
        Self::with_backoff(options.exponential_backoff())
    }

    /// Retry transport failures only, with exponential backoff.
    pub fn system_errors(options: &RetryOptions) -> Self {
        let backoff = options.exponential_backoff();
        let max_delay = backoff.max_retry_delay();
        Self::new(vec![SystemErrorRetry::new(backoff).into()])
            .with_max_retries(options.max_retries)
            .with_max_delay(max_delay)
    }

    /// Honor server throttling hints only.
    pub fn throttling() -> Self {
        Self::new(vec![ThrottlingRetry::new().into()])
    }

    /// Executor over a single exponential strategy, capped at its ceiling.
    pub fn with_backoff(backoff: ExponentialBackoff) -> Self {
        let max_retries = backoff.max_retries();
        let max_delay = backoff.max_retry_delay();
        Self::new(vec![backoff.into()])
            .with_max_retries(max_retries)
            .with_max_delay(max_delay)
    }

    /// Set the attempt budget: at most `max_retries + 1` attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the ceiling applied to every delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Use `timer` for backoff waits.
    pub fn with_timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Arc::new(timer);
        self
    }

    /// Call `hook` before every retry and once more before giving up.
    ///
    /// The hook runs synchronously on the request's task and should not block.
    /// `next_delay` is `None` on the final call.
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Strategies in priority order.
    pub fn strategies(&self) -> &[RetryStrategy] {
        &self.strategies
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Ceiling applied to every delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn notify(
        &self,
        request: &Request,
        outcome: &Outcome,
        next_delay: Option<Duration>,
        state: &RetryState,
    ) {
        let Some(hook) = &self.on_retry else {
            return;
        };
        let outcome = match outcome {
            Ok(response) => AttemptOutcome::Status(response.status()),
            Err(err) => AttemptOutcome::Failure(err),
        };
        hook(&RetryEvent {
            attempt: state.attempts(),
            method: request.method(),
            url: request.url(),
            outcome,
            next_delay,
            elapsed: state.elapsed(),
        });
    }

    async fn execute<'a>(&'a self, request: &'a mut Request, next: Next<'a>) -> Outcome {
        let mut state = RetryState::new();
        let wait = DelayOptions::new()
            .with_cancellation(request.cancellation().clone())
            .with_cancel_message(OPERATION_ABORTED);

        loop {
            state.begin_attempt();
            let outcome = next.run(&mut *request).await;

            if matches!(&outcome, Err(err) if err.is_cancelled()) {
                return outcome;
            }

            let (decision, strategy) = evaluate(&self.strategies, request, &outcome, &state);
            match decision {
                RetryDecision::Retry(delay) if state.attempts() <= self.max_retries => {
                    let delay = delay.min(self.max_delay);
                    if let Some(RetryStrategy::Throttling(_)) = strategy {
                        state.observe_retry_after(delay);
                    }
                    self.notify(request, &outcome, Some(delay), &state);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        attempt = state.attempts(),
                        strategy = strategy.map_or("none", RetryStrategy::name),
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );

                    delay_with(self.timer.as_ref(), delay, (), &wait).await?;
                    state.record_delay(delay);
                }
                RetryDecision::Retry(_) | RetryDecision::Exhausted => {
                    self.notify(request, &outcome, None, &state);

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempts = state.attempts(),
                        strategy = strategy.map_or("none", RetryStrategy::name),
                        total_delay_ms = state.total_delay().as_millis() as u64,
                        "retry budget exceeded"
                    );

                    return Err(budget_exceeded(outcome, state.attempts()));
                }
                RetryDecision::NoRetry | RetryDecision::Abstain => return outcome,
            }
        }
    }
}

fn budget_exceeded(outcome: Outcome, attempts: u32) -> PipelineError {
    let cause = match outcome {
        Ok(response) => PipelineError::RetryableStatus {
            status: response.status(),
        },
        Err(err) => err,
    };
    PipelineError::RetryBudgetExceeded {
        attempts,
        cause: Box::new(cause),
    }
}

impl Middleware for RetryPolicy {
    fn handle<'a>(&'a self, request: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(self.execute(request, next))
    }
}
