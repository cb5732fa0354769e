//! Testing helpers and fake collaborators.
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! downstream crates' tests.

use crate::clock::Clock;
use crate::outbound::{OutboundError, OutboundSender};
use crate::task::{TaskError, TaskRequest, TaskRunner};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

/// Fixed start time used across tests: 2023-11-14T22:13:20Z.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(epoch())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outbound sender that records every message.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingSender {
    /// Sender that succeeds and records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (they are still recorded).
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every `(to, body)` pair sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bodies sent to `to`.
    #[must_use]
    pub fn sent_to(&self, to: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, body)| body)
            .collect()
    }
}

#[async_trait]
impl OutboundSender for RecordingSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), OutboundError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((to.to_string(), body.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(OutboundError::Transport("scripted failure".to_string()));
        }
        Ok(())
    }
}

/// What a [`ScriptedTaskRunner`] does when run.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Return this result text.
    Succeed(String),
    /// Return a `TaskError::Failed` with this message.
    Fail(String),
    /// Panic inside the runner.
    Panic,
}

/// Task runner with a fixed outcome and an optional release gate.
///
/// A gated runner blocks every run until [`ScriptedTaskRunner::release`]
/// is called, which lets tests interleave inbound messages with a task
/// that is still in flight.
#[derive(Debug)]
pub struct ScriptedTaskRunner {
    outcome: ScriptedOutcome,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TaskRequest>>,
}

impl ScriptedTaskRunner {
    /// Runner that returns `result`.
    #[must_use]
    pub fn succeeding(result: impl Into<String>) -> Self {
        Self::with_outcome(ScriptedOutcome::Succeed(result.into()))
    }

    /// Runner that fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(ScriptedOutcome::Fail(message.into()))
    }

    /// Runner that panics.
    #[must_use]
    pub fn panicking() -> Self {
        Self::with_outcome(ScriptedOutcome::Panic)
    }

    /// Runner with an explicit outcome.
    #[must_use]
    pub fn with_outcome(outcome: ScriptedOutcome) -> Self {
        Self {
            outcome,
            gate: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold every run until released.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let one held run finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Number of runs started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<TaskRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wrap in an `Arc` for injection.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl TaskRunner for ScriptedTaskRunner {
    async fn run(&self, request: &TaskRequest) -> Result<String, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| TaskError::Aborted(e.to_string()))?
                .forget();
        }

        match &self.outcome {
            ScriptedOutcome::Succeed(result) => Ok(result.clone()),
            ScriptedOutcome::Fail(message) => Err(TaskError::Failed(message.clone())),
            ScriptedOutcome::Panic => panic!("scripted task runner panic"),
        }
    }
}
