//! Shared utilities for integration tests.
//!
//! [`ScriptedTransport`] plays back a list of [`Step`]s, one per attempt,
//! and records every connect instant and every request it was asked to send.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batchfetch_core::request::{AttemptError, BoxError, Connection, PreparedRequest, Target, Transport};
use batchfetch_core::response::Response;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use tokio::time::Instant;

/// What one attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Connect fails immediately with `ConnectionRefused`.
    RefuseConnect,
    /// Connect never completes.
    StallConnect,
    /// Connect takes this long, then the attempt continues as the inner step.
    SlowConnect(Duration, Box<Step>),
    /// Connects, then the exchange never completes.
    StallTransfer,
    /// Connects, then the exchange fails immediately.
    ResetTransfer,
    /// Connects, waits, then responds.
    SlowRespond(Duration, u16),
    /// Connects and responds immediately.
    Respond(u16),
}

#[derive(Debug)]
struct State {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    connects: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<PreparedRequest>>,
}

/// Transport stub driven by a script of [`Step`]s.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    state: Arc<State>,
}

impl ScriptedTransport {
    /// Plays `script` in order, then repeats `fallback` forever.
    pub fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self {
            state: Arc::new(State {
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                connects: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Every attempt behaves the same way.
    pub fn always(step: Step) -> Self {
        Self::new([], step)
    }

    pub fn as_transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Number of connect calls made so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.lock().unwrap().len()
    }

    /// Instants at which each connect call started.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.state.connects.lock().unwrap().clone()
    }

    /// Requests handed to `send`, in order.
    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        self.state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.state.fallback.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(
        &self,
        _target: &Target,
        _connect_timeout: Duration,
    ) -> Result<Box<dyn Connection>, AttemptError> {
        self.state.connects.lock().unwrap().push(Instant::now());
        let mut step = self.next_step();
        while let Step::SlowConnect(delay, then) = step {
            tokio::time::sleep(delay).await;
            step = *then;
        }
        match step {
            Step::RefuseConnect => Err(AttemptError::Connect(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            Step::StallConnect => std::future::pending().await,
            step => Ok(Box::new(ScriptedConnection {
                step,
                state: Arc::clone(&self.state),
            })),
        }
    }
}

struct ScriptedConnection {
    step: Step,
    state: Arc<State>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn set_deadline(&mut self, _deadline: Instant) {}

    async fn send(&mut self, request: &PreparedRequest) -> Result<Response, AttemptError> {
        self.state.requests.lock().unwrap().push(request.clone());
        match self.step {
            Step::StallTransfer => std::future::pending().await,
            Step::ResetTransfer => Err(AttemptError::transport(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
            Step::SlowRespond(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(response(status, "slow"))
            }
            Step::Respond(status) => Ok(response(status, "ok")),
            Step::RefuseConnect | Step::StallConnect | Step::SlowConnect(..) => {
                unreachable!("connect-phase steps never reach send")
            }
        }
    }
}

/// Builds a response with a fixed body.
pub fn response(status: u16, body: &'static str) -> Response {
    let body = Full::new(Bytes::from_static(body.as_bytes()))
        .map_err(|never| -> BoxError { match never {} })
        .boxed_unsync();
    let mut inner = http::Response::new(body);
    *inner.status_mut() = http::StatusCode::from_u16(status).unwrap();
    Response::new(inner)
}
