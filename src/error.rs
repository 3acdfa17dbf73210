//! Error types shared by the pipeline, the retry executor and transports.
//!
//! The caller of [`Pipeline::send`](crate::Pipeline::send) only ever sees a
//! [`PipelineError`]. Transports report failures as [`TransportError`], which
//! the pipeline normalizes into [`PipelineError::Transport`] before any retry
//! strategy looks at it.

use http::StatusCode;
use thiserror::Error;

/// Boxed error used as the underlying cause of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of a transport-level failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    /// The peer reset the connection.
    ConnectionReset,
    /// The peer refused the connection.
    ConnectionRefused,
    /// Host name resolution failed.
    Dns,
    /// The attempt did not complete in time (connect, socket or request timeout).
    Timeout,
    /// TLS handshake failed.
    Tls,
    /// Any other transport failure. Never retried.
    Other,
}

impl TransportErrorKind {
    /// Stable lowercase name, suitable for logs and metrics labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionReset => "connection_reset",
            Self::ConnectionRefused => "connection_refused",
            Self::Dns => "dns",
            Self::Timeout => "timeout",
            Self::Tls => "tls",
            Self::Other => "other",
        }
    }

    /// Returns true for failures the system-error and exponential strategies
    /// treat as transient.
    pub const fn is_system_error(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
///
/// # Examples
///
/// ```rust
/// use retryline::{TransportError, TransportErrorKind};
///
/// let err = TransportError::new(TransportErrorKind::ConnectionReset, "socket hang up");
/// assert!(err.kind().is_system_error());
/// assert_eq!(err.to_string(), "connection_reset transport failure: socket hang up");
/// ```
#[derive(Debug, Error)]
#[error("{kind} transport failure: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Create a transport error without an underlying cause.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping an underlying cause.
    pub fn with_source(
        kind: TransportErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The failure classification.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                TransportErrorKind::ConnectionReset
            }
            ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            ErrorKind::TimedOut => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Other,
        };
        let message = err.to_string();
        Self::with_source(kind, message, err)
    }
}

/// Stable machine-readable code for a [`PipelineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineErrorCode {
    /// See [`PipelineError::Transport`].
    Transport,
    /// See [`PipelineError::RetryableStatus`].
    RetryableStatus,
    /// See [`PipelineError::Cancelled`].
    Cancelled,
    /// See [`PipelineError::RetryBudgetExceeded`].
    RetryBudgetExceeded,
}

impl PipelineErrorCode {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::RetryableStatus => "retryable_status",
            Self::Cancelled => "cancelled",
            Self::RetryBudgetExceeded => "retry_budget_exceeded",
        }
    }
}

/// Terminal failure of one logical operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Connection-level failure reported by the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A response carried a status the retry strategies consider transient.
    ///
    /// Only surfaces as the cause of [`PipelineError::RetryBudgetExceeded`].
    #[error("retryable http status {status}")]
    RetryableStatus {
        /// The HTTP status code of the last response.
        status: StatusCode,
    },
    /// The operation was aborted through its cancellation token.
    #[error("{message}")]
    Cancelled {
        /// The configured abort message.
        message: String,
    },
    /// Attempts ran out while the last outcome was still retryable.
    #[error("retry budget exceeded after {attempts} attempts: {cause}")]
    RetryBudgetExceeded {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last retryable failure.
        #[source]
        cause: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Create a cancellation error with the given message.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// The machine-readable error code.
    pub const fn code(&self) -> PipelineErrorCode {
        match self {
            Self::Transport(_) => PipelineErrorCode::Transport,
            Self::RetryableStatus { .. } => PipelineErrorCode::RetryableStatus,
            Self::Cancelled { .. } => PipelineErrorCode::Cancelled,
            Self::RetryBudgetExceeded { .. } => PipelineErrorCode::RetryBudgetExceeded,
        }
    }

    /// Returns true if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns the transport failure kind, if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Number of attempts recorded on the error, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryBudgetExceeded { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Failure to assemble a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A positional operation referenced a middleware name that is not in the chain.
    #[error("no middleware named `{name}` in the pipeline")]
    UnknownMiddleware {
        /// The missing name.
        name: String,
    },
    /// A middleware with the same name is already in the chain.
    #[error("a middleware named `{name}` is already in the pipeline")]
    DuplicateMiddleware {
        /// The duplicated name.
        name: String,
    },
    /// A configured header name is not a valid HTTP header name.
    #[error("`{name}` is not a valid header name")]
    InvalidHeaderName {
        /// The rejected name.
        name: String,
    },
}
