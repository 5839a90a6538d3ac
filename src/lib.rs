//! Batchfetch Core Library
//!
//! Resilient HTTP request execution for batch jobs: every request gets a
//! bounded connect phase, an absolute transfer deadline and a fixed-delay
//! retry loop, and a batch runner fans requests out under a concurrency cap.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`request`] - Request specs, the attempt/retry executor and the transport seam
//! - [`response`] - Raw responses and the body decoders callers apply to them
//! - [`batch`] - Bounded-concurrency fan-out over a list of targets

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use batch::{BatchError, BatchRunner, DEFAULT_CONCURRENCY};
pub use request::{
    AttemptError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT,
    DEFAULT_TRANSFER_TIMEOUT, Executor, HttpTransport, InvalidRequestReason, RequestConfig,
    RequestError, RequestSpec, RetryPolicy, Transport,
};
pub use response::{DecodeError, Response};
