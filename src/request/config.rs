//! Timing and retry configuration for a single request.

use std::time::Duration;

/// Default connection-establishment timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default transfer deadline, measured from the moment the connection is up (15 seconds).
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of attempts, including the first one.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Default pause between failed attempts (3 seconds).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Timing and retry settings applied to one request.
///
/// # Default Values
///
/// - `connect_timeout`: 10 seconds
/// - `transfer_timeout`: 15 seconds
/// - `retry_limit`: 3 attempts
/// - `retry_delay`: 3 seconds
///
/// Values are validated when the request is executed, not when they are set:
/// zero timeouts and a zero retry limit are reported as invalid requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    /// Upper bound on establishing the connection.
    pub connect_timeout: Duration,
    /// Absolute deadline for all reads and writes, anchored at connect time.
    pub transfer_timeout: Duration,
    /// Number of attempts, not retries-after-first.
    pub retry_limit: u32,
    /// Pause between failed attempts; zero disables the pause.
    pub retry_delay: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_default_values() {
        let config = RequestConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.transfer_timeout, Duration::from_secs(15));
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(3));
    }
}
