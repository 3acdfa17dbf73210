//! Randomized perturbation of backoff delays.

use std::time::Duration;

/// Strategy for adding randomness to delays.
///
/// Without the `jitter` feature every variant returns the base delay.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", tag = "type", content = "factor"))]
pub enum JitterStrategy {
    /// No jitter applied.
    None,
    /// Scale the delay by a factor drawn uniformly from `[1 - f, 1 + f]`.
    Proportional(f64),
    /// Random delay between 0 and the calculated delay.
    Full,
}

impl Default for JitterStrategy {
    /// ±20%, the spread the exponential strategy uses unless overridden.
    fn default() -> Self {
        JitterStrategy::Proportional(0.2)
    }
}

impl JitterStrategy {
    /// Proportional jitter with the factor clamped to `[0, 1]`. A non-finite
    /// factor disables jitter.
    pub fn proportional(factor: f64) -> Self {
        if factor.is_finite() {
            JitterStrategy::Proportional(factor.clamp(0.0, 1.0))
        } else {
            JitterStrategy::None
        }
    }

    /// Apply jitter to `base_delay`, then cap the result at `max_delay`.
    ///
    /// A `Proportional` factor that is not finite behaves like `None`.
    pub fn apply(&self, base_delay: Duration, max_delay: Duration) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                if !factor.is_finite() || *factor <= f64::EPSILON {
                    base_delay
                } else {
                    let factor = factor.min(1.0);
                    let scale = rand::rng().random_range((1.0 - factor)..=(1.0 + factor));
                    base_delay.mul_f64(scale)
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_nanos = base_delay.as_nanos().min(u64::MAX as u128) as u64;
                if max_nanos == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_nanos(rand::rng().random_range(0..=max_nanos))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
        };

        jittered.min(max_delay)
    }
}
