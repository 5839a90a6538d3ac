//! Request execution engine with per-attempt deadlines and fixed-delay retry.
//!
//! A [`RequestSpec`] describes one request; an [`Executor`] runs it, making up
//! to `retry_limit` attempts and returning either the response or a terminal
//! [`RequestError`].
//!
//! # Features
//!
//! - Fluent builder with form, JSON, raw and query helpers
//! - Independent connect timeout and transfer deadline (10s / 15s by default)
//! - Transfer deadline anchored at connect time, not extended by progress
//! - Fixed delay between failed attempts (3 attempts, 3s apart by default)
//! - Pluggable [`Transport`] for tests and custom stacks
//!
//! # Example
//!
//! ```no_run
//! use batchfetch_core::request::RequestSpec;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let response = RequestSpec::get("https://example.com/data.json").send().await?;
//! let value: serde_json::Value = response.json().await?;
//! println!("{value}");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod executor;
mod retry;
mod spec;
mod transport;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT, DEFAULT_TRANSFER_TIMEOUT,
    RequestConfig,
};
pub use error::{AttemptError, BoxError, InvalidRequestReason, RequestError};
pub use executor::Executor;
pub use retry::{RetryDecision, RetryPolicy};
pub use spec::{
    BodyEncoding, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE, PreparedRequest, RequestSpec, Scheme,
    Target,
};
pub use transport::{Connection, HttpTransport, Transport};
