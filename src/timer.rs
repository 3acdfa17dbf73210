//! Clock/timer collaborator used by the delay primitive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

/// Schedules a single wake-up after a duration.
///
/// Each call to [`Timer::sleep`] creates exactly one timer. Dropping the
/// returned future cancels the timer; dropping it more than once is
/// impossible, so cancellation is idempotent by construction.
pub trait Timer: Send + Sync + fmt::Debug {
    /// Create a timer that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        (**self).sleep(duration)
    }
}

/// [`Timer`] backed by `tokio::time::sleep`.
///
/// Honors tokio's paused clock, so tests using `start_paused` advance
/// through backoff delays instantly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
