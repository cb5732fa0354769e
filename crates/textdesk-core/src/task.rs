//! Long-running task requests and runners
//!
//! The router never waits for the actual scan or analysis. It hands a
//! `TaskRequest` to the completion bridge, which runs it through a
//! `TaskRunner` and reports back to the sender later.

use crate::agent::AgentKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors that can occur while running a task
#[derive(Debug, Error)]
pub enum TaskError {
    /// The runner could not complete the work
    #[error("Task failed: {0}")]
    Failed(String),
    /// The payload cannot be worked on
    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),
    /// The runner panicked or was aborted
    #[error("Task aborted: {0}")]
    Aborted(String),
}

/// Kind of long-running work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Scan a business website.
    Scan,
    /// Analyze a training video.
    AnalyzeMedia,
}

impl TaskKind {
    /// Short human label used in failure replies.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scan => "scan of your site",
            Self::AnalyzeMedia => "video analysis",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scan => "scan",
            Self::AnalyzeMedia => "analyze_media",
        })
    }
}

/// A scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Unique task id.
    pub id: Uuid,
    /// Who gets notified on completion.
    pub sender: String,
    /// Agent whose stage the completion advances.
    pub agent: AgentKind,
    /// What to run.
    pub kind: TaskKind,
    /// Link or text to work on.
    pub payload: String,
    /// Sender's first name, if captured.
    pub name: Option<String>,
}

impl TaskRequest {
    /// Create a request with a fresh id.
    #[must_use]
    pub fn new(
        sender: impl Into<String>,
        agent: AgentKind,
        kind: TaskKind,
        payload: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            agent,
            kind,
            payload: payload.into(),
            name,
        }
    }

    /// Name to address the sender by.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("there")
    }
}

/// Executes the actual scan or analysis.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run `request` to completion and return a result summary.
    async fn run(&self, request: &TaskRequest) -> Result<String, TaskError>;
}

/// Stand-in runner returning canned findings for each task kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedTaskRunner;

#[async_trait]
impl TaskRunner for SimulatedTaskRunner {
    async fn run(&self, request: &TaskRequest) -> Result<String, TaskError> {
        if request.payload.trim().is_empty() {
            return Err(TaskError::InvalidPayload("empty payload".to_string()));
        }
        debug!(task_id = %request.id, kind = %request.kind, "Running simulated task");
        Ok(match request.kind {
            TaskKind::Scan => format!(
                "{} takes 4.2s to load on mobile, has no meta description, and hides the contact button below the fold.",
                request.payload
            ),
            TaskKind::AnalyzeMedia => {
                "Your knees cave in on the way up and your heels lift early. Both are fixable in two weeks.".to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_scan_mentions_payload() {
        let request = TaskRequest::new(
            "+1555",
            AgentKind::Business,
            TaskKind::Scan,
            "https://example.com",
            Some("Alex".to_string()),
        );
        let result = SimulatedTaskRunner.run(&request).await.expect("scan result");
        assert!(result.starts_with("https://example.com"));
    }

    #[tokio::test]
    async fn test_simulated_runner_rejects_empty_payload() {
        let request = TaskRequest::new("+1555", AgentKind::Coach, TaskKind::AnalyzeMedia, " ", None);
        let err = SimulatedTaskRunner.run(&request).await.expect_err("empty payload");
        assert!(matches!(err, TaskError::InvalidPayload(_)));
        assert_eq!(request.display_name(), "there");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = TaskRequest::new("+1", AgentKind::Coach, TaskKind::AnalyzeMedia, "x", None);
        let b = TaskRequest::new("+1", AgentKind::Coach, TaskKind::AnalyzeMedia, "x", None);
        assert_ne!(a.id, b.id);
    }
}
