//! Agent state machines
//!
//! Both agents walk the same stage sequence:
//!
//! ```text
//! Init -> AwaitingName -> AwaitingDetail -> {Scanning | Processing} -> Suggesting -> Suggesting ...
//! ```
//!
//! Transitions are pure: `(state, text) -> Step`. Long-running work is only
//! requested through [`Step::side_effect`]; the stage leaves `Scanning` or
//! `Processing` through the completion path, never through user input. Any
//! stage an agent does not recognize resets to `AwaitingName`.

/// Business advisory agent (Percy).
pub mod business;
/// Sports coaching agent (Coach).
pub mod coach;

use crate::task::{TaskKind, TaskRequest};
use lazy_regex::lazy_regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `http(s)://` or `www.` followed by at least one host character;
/// trailing punctuation is trimmed separately.
static RE_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)\b(?:https?://|www\.)[a-z0-9][^\s<>]*");

/// Identifies one of the two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Business advisory agent.
    Business,
    /// Sports coaching agent.
    Coach,
}

impl AgentKind {
    /// Display name used in replies and logs.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Business => "Percy",
            Self::Coach => "Coach",
        }
    }

    /// Reply sent out-of-band when a scheduled task finishes.
    #[must_use]
    pub fn completion_reply(self, request: &TaskRequest, result: &str) -> String {
        match self {
            Self::Business => business::completion_reply(request, result),
            Self::Coach => coach::completion_reply(request, result),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Conversation step within one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing said yet.
    #[default]
    Init,
    /// Waiting for the sender's first name.
    AwaitingName,
    /// Waiting for a website, goal or media link.
    AwaitingDetail,
    /// Business agent is scanning a site.
    Scanning,
    /// Coach agent is working on the request.
    Processing,
    /// Offering numbered follow-ups.
    Suggesting,
    /// Any stage value this build does not know about.
    #[serde(other)]
    Unknown,
}

/// Sub-state of one agent inside a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    /// Current stage.
    pub stage: Stage,
    /// First name captured at `AwaitingName`.
    #[serde(default)]
    pub name: Option<String>,
    /// Raw text captured at `AwaitingDetail`.
    #[serde(default)]
    pub detail: Option<String>,
}

impl AgentState {
    /// Name to address the sender by.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("there")
    }

    fn at(&self, stage: Stage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }
}

/// Request for long-running work produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffect {
    /// What to run.
    pub kind: TaskKind,
    /// Link or text the task works on.
    pub payload: String,
}

/// Outcome of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Sub-state after the transition.
    pub state: AgentState,
    /// Reply for this turn.
    pub reply: String,
    /// Work to schedule, if any.
    pub side_effect: Option<SideEffect>,
}

impl Step {
    fn reply(state: AgentState, reply: impl Into<String>) -> Self {
        Self {
            state,
            reply: reply.into(),
            side_effect: None,
        }
    }

    fn with_effect(mut self, kind: TaskKind, payload: impl Into<String>) -> Self {
        self.side_effect = Some(SideEffect {
            kind,
            payload: payload.into(),
        });
        self
    }
}

/// Run one transition of `agent`'s state machine.
#[must_use]
pub fn step(agent: AgentKind, state: &AgentState, text: &str) -> Step {
    match agent {
        AgentKind::Business => business::step(state, text),
        AgentKind::Coach => coach::step(state, text),
    }
}

/// First link in `text`, without trailing sentence punctuation.
#[must_use]
pub fn find_url(text: &str) -> Option<&str> {
    RE_URL
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '"', '\'']))
        .filter(|url| !url.is_empty())
}

/// First whitespace-delimited token with surrounding punctuation removed.
#[must_use]
pub fn capture_name(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Shared fallback for a stage the agent does not handle.
fn recover(state: &AgentState, prompt: &str) -> Step {
    Step::reply(
        state.at(Stage::AwaitingName),
        format!("Sorry, I lost track of where we were. Let's pick it back up: {prompt}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_find_url() {
        assert_eq!(find_url("https://example.com"), Some("https://example.com"));
        assert_eq!(
            find_url("my site is www.shop.io."),
            Some("www.shop.io")
        );
        assert_eq!(
            find_url("see (HTTP://Example.com/a?b=1), thanks"),
            Some("HTTP://Example.com/a?b=1")
        );
        assert_eq!(find_url("example dot com"), None);
        assert_eq!(find_url(""), None);
        // Prefix without a host
        assert_eq!(find_url("https://."), None);
        assert_eq!(find_url("https://!!!"), None);
        assert_eq!(find_url("www.."), None);
        assert_eq!(find_url("http://)"), None);
    }

    #[test]
    fn test_capture_name() {
        assert_eq!(capture_name("Alex"), Some("Alex".to_string()));
        assert_eq!(capture_name("  Alex Smith "), Some("Alex".to_string()));
        assert_eq!(capture_name("Alex, hi"), Some("Alex".to_string()));
        assert_eq!(capture_name("   "), None);
        assert_eq!(capture_name("!!!"), None);
    }

    #[test]
    fn test_unknown_stage_recovers_for_both_agents() {
        let state = AgentState {
            stage: Stage::Unknown,
            name: Some("Alex".to_string()),
            detail: None,
        };
        for agent in [AgentKind::Business, AgentKind::Coach] {
            let next = step(agent, &state, "hello?");
            assert_eq!(next.state.stage, Stage::AwaitingName);
            assert!(next.side_effect.is_none());
            assert!(next.reply.starts_with("Sorry"));
        }
    }

    #[test]
    fn test_stage_serde_names() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Stage::AwaitingDetail)?, "\"awaiting_detail\"");
        let stage: Stage = serde_json::from_str("\"suggesting\"")?;
        assert_eq!(stage, Stage::Suggesting);
        let stage: Stage = serde_json::from_str("\"not_a_stage\"")?;
        assert_eq!(stage, Stage::Unknown);
        Ok(())
    }

    fn any_stage() -> impl Strategy<Value = Stage> {
        prop_oneof![
            Just(Stage::Init),
            Just(Stage::AwaitingName),
            Just(Stage::AwaitingDetail),
            Just(Stage::Scanning),
            Just(Stage::Processing),
            Just(Stage::Suggesting),
            Just(Stage::Unknown),
        ]
    }

    proptest! {
        /// Every transition yields a reply and never a task outside AwaitingDetail.
        #[test]
        fn transitions_are_total(
            stage in any_stage(),
            coach in proptest::bool::ANY,
            text in "\\PC{0,40}",
        ) {
            let agent = if coach { AgentKind::Coach } else { AgentKind::Business };
            let state = AgentState { stage, name: None, detail: None };
            let next = step(agent, &state, &text);
            prop_assert!(!next.reply.is_empty());
            if stage != Stage::AwaitingDetail {
                prop_assert!(next.side_effect.is_none());
            }
        }

        /// Busy stages only move through the completion path.
        #[test]
        fn busy_stages_hold(text in "\\PC{0,40}") {
            let scanning = AgentState { stage: Stage::Scanning, ..AgentState::default() };
            prop_assert_eq!(step(AgentKind::Business, &scanning, &text).state.stage, Stage::Scanning);
            let processing = AgentState { stage: Stage::Processing, ..AgentState::default() };
            prop_assert_eq!(step(AgentKind::Coach, &processing, &text).state.stage, Stage::Processing);
        }
    }
}
