//! Async task completion bridge
//!
//! Schedules long-running work and, once it finishes, pushes an
//! out-of-band reply to the sender and moves the owning agent to
//! `Suggesting`. The stage write is unconditional: if the sender sent
//! other messages while the task was running, the completion still wins.
//! On failure the sender gets a generic apology and the stage is left as
//! it was.

use crate::gate::TurnGate;
use std::sync::Arc;
use std::time::Duration;
use textdesk_core::agent::Stage;
use textdesk_core::outbound::OutboundSender;
use textdesk_core::session::SessionStore;
use textdesk_core::task::{TaskError, TaskRequest, TaskRunner};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Builds the success reply from the request and the runner's result.
pub type CompletionFn = fn(&TaskRequest, &str) -> String;

/// Runs scheduled tasks and applies their completions.
pub struct CompletionBridge {
    store: Arc<dyn SessionStore>,
    outbound: Arc<dyn OutboundSender>,
    runner: Arc<dyn TaskRunner>,
    gate: TurnGate,
    delay: Duration,
    tracker: TaskTracker,
}

impl CompletionBridge {
    /// Create a bridge.
    ///
    /// `delay` is waited before each task starts, standing in for queueing
    /// latency of a real job system.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        outbound: Arc<dyn OutboundSender>,
        runner: Arc<dyn TaskRunner>,
        gate: TurnGate,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            outbound,
            runner,
            gate,
            delay,
            tracker: TaskTracker::new(),
        }
    }

    /// Gate shared with the router.
    #[must_use]
    pub fn gate(&self) -> TurnGate {
        self.gate.clone()
    }

    /// Start `request` in the background. There is no way to cancel it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, request: TaskRequest, compose: CompletionFn) {
        info!(
            task_id = %request.id,
            sender = %request.sender,
            agent = %request.agent,
            kind = %request.kind,
            "Scheduling task"
        );
        let job = Completion {
            store: self.store.clone(),
            outbound: self.outbound.clone(),
            runner: self.runner.clone(),
            gate: self.gate.clone(),
            delay: self.delay,
        };
        self.tracker.spawn(job.run(request, compose));
    }

    /// Number of tasks still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every scheduled task has completed.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

/// Everything one background completion needs, detached from the bridge.
struct Completion {
    store: Arc<dyn SessionStore>,
    outbound: Arc<dyn OutboundSender>,
    runner: Arc<dyn TaskRunner>,
    gate: TurnGate,
    delay: Duration,
}

impl Completion {
    async fn run(self, request: TaskRequest, compose: CompletionFn) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = match self.execute(&request).await {
            Ok(result) => {
                info!(task_id = %request.id, sender = %request.sender, "Task completed");
                self.advance(&request).await;
                compose(&request, &result)
            }
            Err(e) => {
                warn!(task_id = %request.id, sender = %request.sender, error = %e, "Task failed");
                failure_reply(&request)
            }
        };

        if let Err(e) = self.outbound.send_text(&request.sender, &reply).await {
            error!(
                task_id = %request.id,
                sender = %request.sender,
                error = %e,
                "Failed to deliver task reply"
            );
        }
    }

    /// Run the task on its own Tokio task so a panicking runner is reported
    /// as a failure instead of silently killing the completion.
    async fn execute(&self, request: &TaskRequest) -> Result<String, TaskError> {
        let runner = self.runner.clone();
        let owned = request.clone();
        tokio::spawn(async move { runner.run(&owned).await })
            .await
            .map_err(|e| TaskError::Aborted(e.to_string()))?
    }

    async fn advance(&self, request: &TaskRequest) {
        let _turn = self.gate.enter().await;
        let Some(mut session) = self.store.get(&request.sender).await else {
            debug!(task_id = %request.id, sender = %request.sender, "Session expired before completion");
            return;
        };
        let Some(state) = session.agent_state_mut(request.agent) else {
            debug!(task_id = %request.id, agent = %request.agent, "Agent state missing on completion");
            return;
        };
        if state.stage != Stage::Scanning && state.stage != Stage::Processing {
            debug!(
                task_id = %request.id,
                stage = ?state.stage,
                "Overwriting stage that moved on while the task ran"
            );
        }
        state.stage = Stage::Suggesting;
        self.store.put(&request.sender, session).await;
    }
}

fn failure_reply(request: &TaskRequest) -> String {
    format!(
        "Sorry {}, the {} didn't go through. Please try again in a little while.",
        request.display_name(),
        request.kind.label()
    )
}
