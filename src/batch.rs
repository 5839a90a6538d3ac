//! Bounded-concurrency fan-out of an action over a list of targets.
//!
//! # Concurrency Model
//!
//! - A semaphore sized to `concurrency` acts as the admission gate
//! - A permit is acquired *before* each action is spawned, so the submitting
//!   loop blocks while the gate is full
//! - Each action runs in its own Tokio task and releases its permit when it
//!   finishes, however it finishes (RAII)
//! - [`BatchRunner::run`] returns only after every spawned task has completed
//!
//! Actions are fire-and-forget: their results are not collected. A caller
//! that needs them captures a shared sink inside the action.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use batchfetch_core::{BatchRunner, Executor, RequestSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Executor::new();
//! let failures = Arc::new(AtomicUsize::new(0));
//! let sink = Arc::clone(&failures);
//!
//! BatchRunner::new(3)?
//!     .run(vec!["https://example.com/a", "https://example.com/b"], move |url| {
//!         let executor = executor.clone();
//!         let failures = Arc::clone(&sink);
//!         async move {
//!             if executor.execute(RequestSpec::get(url)).await.is_err() {
//!                 failures.fetch_add(1, Ordering::SeqCst);
//!             }
//!         }
//!     })
//!     .await?;
//!
//! println!("failed: {}", failures.load(Ordering::SeqCst));
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for batch runner operations.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Invalid concurrency value provided.
    #[error("invalid concurrency value {value}: must be at least {MIN_CONCURRENCY}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The admission gate was closed while targets were still pending.
    #[error("admission gate closed unexpectedly")]
    GateClosed,
}

/// Runs an action for every target with at most `concurrency` in flight.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    concurrency: usize,
}

impl BatchRunner {
    /// Creates a runner with the given concurrency cap.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidConcurrency`] if `concurrency` is zero.
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, BatchError> {
        if concurrency < MIN_CONCURRENCY {
            return Err(BatchError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self { concurrency })
    }

    /// Returns the configured concurrency cap.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `action` once per target and waits for all of them.
    ///
    /// No ordering is guaranteed between targets. A panicking action is
    /// logged and does not affect the others.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::GateClosed`] if the admission gate closes, which
    /// does not happen while the runner owns it.
    #[instrument(skip(self, targets, action), fields(concurrency = self.concurrency))]
    pub async fn run<T, I, F, Fut>(&self, targets: I, action: F) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let action = Arc::new(action);
        let mut handles = Vec::new();

        info!("starting batch");

        for target in targets {
            // Blocks the submitter while `concurrency` actions are running
            let permit = Arc::clone(&gate)
                .acquire_owned()
                .await
                .map_err(|_| BatchError::GateClosed)?;

            let action = Arc::clone(&action);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                action(target).await;
            }));
        }

        let launched = handles.len();
        debug!(task_count = launched, "waiting for actions to complete");

        let mut panicked = 0usize;
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "batch action panicked");
                panicked += 1;
            }
        }

        info!(launched, panicked, "batch complete");
        Ok(())
    }
}
