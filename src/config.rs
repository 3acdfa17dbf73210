//! Plain option structs for building the standard pipeline.
//!
//! With the `serde` feature the structs deserialize from camelCase keys and
//! every field is optional, falling back to its default.

use std::time::Duration;

use crate::pipeline::DEFAULT_REQUEST_ID_HEADER;
use crate::retry::{
    ExponentialBackoff, JitterStrategy, ThrottlingRetry, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_RETRY_DELAY, DEFAULT_MAX_THROTTLE_DELAY, DEFAULT_RETRY_DELAY,
};

/// Retry parameters shared by the exponential and throttling strategies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct RetryOptions {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay of the exponential strategy, in milliseconds.
    pub retry_delay_in_ms: u64,
    /// Ceiling of the exponential strategy, in milliseconds.
    pub max_retry_delay_in_ms: u64,
    /// Do not retry connection-level failures.
    pub ignore_system_errors: bool,
    /// Do not retry retryable HTTP statuses.
    pub ignore_http_status_codes: bool,
    /// Ceiling for server-requested throttling delays, in milliseconds.
    pub max_throttle_delay_in_ms: u64,
    /// Proportional jitter factor in `[0, 1]`; 0 disables jitter.
    pub jitter: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_in_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            max_retry_delay_in_ms: DEFAULT_MAX_RETRY_DELAY.as_millis() as u64,
            ignore_system_errors: false,
            ignore_http_status_codes: false,
            max_throttle_delay_in_ms: DEFAULT_MAX_THROTTLE_DELAY.as_millis() as u64,
            jitter: 0.2,
        }
    }
}

impl RetryOptions {
    /// The exponential strategy these options describe.
    pub fn exponential_backoff(&self) -> ExponentialBackoff {
        let jitter = if self.jitter > 0.0 {
            JitterStrategy::proportional(self.jitter)
        } else {
            JitterStrategy::None
        };
        ExponentialBackoff::new()
            .with_retry_delay(Duration::from_millis(self.retry_delay_in_ms))
            .with_max_retry_delay(Duration::from_millis(self.max_retry_delay_in_ms))
            .with_max_retries(self.max_retries)
            .ignore_system_errors(self.ignore_system_errors)
            .ignore_http_status_codes(self.ignore_http_status_codes)
            .with_jitter(jitter)
    }

    /// The throttling strategy these options describe.
    pub fn throttling(&self) -> ThrottlingRetry {
        ThrottlingRetry::new().with_max_delay(Duration::from_millis(self.max_throttle_delay_in_ms))
    }
}

/// Allowlist extensions for the logging middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct LogOptions {
    /// Header names whose values may be logged.
    pub additional_allowed_header_names: Vec<String>,
    /// Query parameters whose values may be logged.
    pub additional_allowed_query_parameters: Vec<String>,
}

/// Options for [`Pipeline::from_options`](crate::Pipeline::from_options).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct PipelineOptions {
    /// Retry stage parameters.
    pub retry: RetryOptions,
    /// Header the request id is written to.
    pub request_id_header_name: String,
    /// Logging stage parameters. Ignored without the `tracing` feature.
    pub logging: LogOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            request_id_header_name: DEFAULT_REQUEST_ID_HEADER.to_owned(),
            logging: LogOptions::default(),
        }
    }
}
