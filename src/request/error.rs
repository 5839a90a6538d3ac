//! Error types for the request module.
//!
//! A request either cannot be built at all ([`RequestError::InvalidRequest`],
//! never retried) or every attempt failed at the transport level
//! ([`RequestError::Exhausted`], carrying the last [`AttemptError`]).

use std::time::Duration;

use thiserror::Error;

/// Boxed error used for opaque transport and body failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure of [`Executor::execute`](super::Executor::execute).
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request could not be constructed; no attempt was made.
    #[error("invalid request for {target:?}: {reason}")]
    InvalidRequest {
        /// The target as supplied by the caller.
        target: String,
        /// Why the request could not be built.
        reason: InvalidRequestReason,
    },

    /// Every permitted attempt failed.
    #[error("request to {target} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// The target that was requested.
        target: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last_error: AttemptError,
    },
}

impl RequestError {
    /// Creates an invalid request error.
    pub fn invalid(target: impl Into<String>, reason: InvalidRequestReason) -> Self {
        Self::InvalidRequest {
            target: target.into(),
            reason,
        }
    }

    /// Creates an exhausted error from the final attempt's failure.
    pub fn exhausted(target: impl Into<String>, attempts: u32, last_error: AttemptError) -> Self {
        Self::Exhausted {
            target: target.into(),
            attempts,
            last_error,
        }
    }

    /// Returns true if the request was rejected before any attempt.
    #[must_use]
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }

    /// Returns the number of attempts made (zero for invalid requests).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::InvalidRequest { .. } => 0,
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Reason a request spec could not be turned into a transport request.
#[derive(Debug, Error)]
pub enum InvalidRequestReason {
    #[error("target is empty")]
    EmptyTarget,

    #[error("target is not a valid absolute URL: {0}")]
    MalformedTarget(#[from] url::ParseError),

    #[error("unsupported scheme {scheme:?} (expected http or https)")]
    UnsupportedScheme { scheme: String },

    #[error("target has no host")]
    MissingHost,

    #[error("target path cannot be used as a request target: {message}")]
    InvalidRequestTarget { message: String },

    #[error("invalid method {method:?}")]
    InvalidMethod { method: String },

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    /// The body could not be serialized when it was attached.
    #[error("body encoding failed: {message}")]
    BodyEncoding { message: String },

    #[error("retry limit must be at least 1 attempt")]
    ZeroRetryLimit,

    #[error("{which} timeout must be greater than zero")]
    ZeroTimeout { which: &'static str },
}

/// Failure of a single attempt. Every variant is retryable.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The connection was not established within the connect timeout.
    #[error("connect timed out after {timeout:?}")]
    ConnectTimeout { timeout: Duration },

    /// The transfer deadline, anchored at connect time, passed.
    #[error("transfer timed out after {timeout:?}")]
    TransferTimeout { timeout: Duration },

    /// The connection could not be established (refused, DNS failure, etc.)
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Any other transport-level failure while exchanging the request.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

impl AttemptError {
    /// Creates a transport error from any error type.
    pub fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport(source.into())
    }

    /// Returns true for either deadline variant.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::TransferTimeout { .. }
        )
    }
}
