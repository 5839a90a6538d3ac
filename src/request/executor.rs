//! Attempt/retry state machine for a single request.
//!
//! ```text
//! Building ──invalid──────────────────────────────► Failed(InvalidRequest)
//!    │
//!    ▼
//! Attempting ──ok──────────────────────────────────► Success(response)
//!    │  ▲
//!    │  └── Retrying (sleep retry_delay) ◄── attempts < retry_limit
//!    │
//!    └──err, attempts == retry_limit ──────────────► Failed(Exhausted)
//! ```
//!
//! Each attempt has two independent bounds: the connection must be up within
//! `connect_timeout`, and from the instant it is up, an absolute deadline of
//! `transfer_timeout` covers everything else. The transfer deadline is not
//! restarted by partial progress.

use std::fmt;
use std::sync::{Arc, LazyLock};

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::config::RequestConfig;
use super::error::{AttemptError, RequestError};
use super::retry::{RetryDecision, RetryPolicy};
use super::spec::{PreparedRequest, RequestSpec};
use super::transport::{HttpTransport, Transport};
use crate::response::Response;

/// Shared by every [`Executor::new`]; building the TLS root store is not free.
static DEFAULT_TRANSPORT: LazyLock<Arc<HttpTransport>> =
    LazyLock::new(|| Arc::new(HttpTransport::new()));

/// Runs request specs against a [`Transport`].
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor backed by the process-wide default [`HttpTransport`].
    #[must_use]
    pub fn new() -> Self {
        let transport: Arc<dyn Transport> = Arc::<HttpTransport>::clone(&DEFAULT_TRANSPORT);
        Self::with_transport(transport)
    }

    /// Creates an executor backed by a custom transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Executes `spec` until it succeeds or its attempts are used up.
    ///
    /// Non-2xx statuses are successful outcomes; only transport failures are
    /// retried.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidRequest`] if the spec cannot be turned into a
    ///   request. No attempt is made.
    /// - [`RequestError::Exhausted`] if every attempt failed, carrying the
    ///   last attempt's error.
    #[instrument(skip(self, spec), fields(url = %spec.target(), method = %spec.method()))]
    pub async fn execute(&self, spec: RequestSpec) -> Result<Response, RequestError> {
        let prepared = spec.prepare().inspect_err(|e| {
            warn!(error = %e, "rejecting invalid request");
        })?;
        let config = *spec.config();
        let policy = RetryPolicy::new(config.retry_limit, config.retry_delay);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, "attempting request");

            match self.attempt(&prepared, &config).await {
                Ok(response) => {
                    debug!(attempt, status = response.status().as_u16(), "request succeeded");
                    return Ok(response);
                }
                Err(e) => match policy.should_retry(attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        warn!(
                            url = %prepared.target,
                            attempt,
                            next_attempt,
                            max_attempts = policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            timeout = e.is_timeout(),
                            error = %e,
                            "attempt failed, retrying"
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        warn!(
                            url = %prepared.target,
                            attempt,
                            timeout = e.is_timeout(),
                            error = %e,
                            %reason,
                            "request failed"
                        );
                        return Err(RequestError::exhausted(spec.target(), attempt, e));
                    }
                },
            }
        }
    }

    /// One connect + send cycle under both deadlines.
    #[instrument(level = "debug", skip_all)]
    async fn attempt(
        &self,
        request: &PreparedRequest,
        config: &RequestConfig,
    ) -> Result<Response, AttemptError> {
        let connect_timeout = config.connect_timeout;
        let mut connection = tokio::time::timeout(
            connect_timeout,
            self.transport.connect(&request.target, connect_timeout),
        )
        .await
        .map_err(|_| AttemptError::ConnectTimeout {
            timeout: connect_timeout,
        })??;

        let deadline = Instant::now() + config.transfer_timeout;
        connection.set_deadline(deadline);

        let transfer_timeout = AttemptError::TransferTimeout {
            timeout: config.transfer_timeout,
        };
        match tokio::time::timeout_at(deadline, connection.send(request)).await {
            Ok(Ok(response)) => Ok(response),
            // The connection's own deadline can surface as an I/O error first.
            Ok(Err(e)) if Instant::now() >= deadline => {
                debug!(error = %e, "transport failed at transfer deadline");
                Err(transfer_timeout)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(transfer_timeout),
        }
    }
}
