//! Per-sender conversation sessions
//!
//! A session records which agent owns the conversation and the sub-state
//! of every agent the sender has talked to. Switching agents never drops
//! the dormant agent's sub-state; only expiry evicts it, together with the
//! rest of the session.

mod store;

pub use store::InMemorySessionStore;

use crate::agent::{AgentKind, AgentState};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Conversation state for one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Agent currently owning the conversation, `None` until one is chosen.
    pub active_agent: Option<AgentKind>,
    /// Last time a routed message touched this session.
    pub last_active_at: DateTime<Utc>,
    /// Business agent sub-state, present once that agent was engaged.
    #[serde(default)]
    pub business: Option<AgentState>,
    /// Coach agent sub-state, present once that agent was engaged.
    #[serde(default)]
    pub coach: Option<AgentState>,
}

impl Session {
    /// Fresh session with no agent selected.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            active_agent: None,
            last_active_at: now,
            business: None,
            coach: None,
        }
    }

    /// Sub-state of `agent`, if it was ever engaged.
    #[must_use]
    pub fn agent_state(&self, agent: AgentKind) -> Option<&AgentState> {
        match agent {
            AgentKind::Business => self.business.as_ref(),
            AgentKind::Coach => self.coach.as_ref(),
        }
    }

    /// Mutable sub-state of `agent`, if it was ever engaged.
    pub fn agent_state_mut(&mut self, agent: AgentKind) -> Option<&mut AgentState> {
        match agent {
            AgentKind::Business => self.business.as_mut(),
            AgentKind::Coach => self.coach.as_mut(),
        }
    }

    /// Sub-state of `agent`, created at `Init` on first engagement.
    pub fn engage(&mut self, agent: AgentKind) -> &mut AgentState {
        match agent {
            AgentKind::Business => self.business.get_or_insert_with(AgentState::default),
            AgentKind::Coach => self.coach.get_or_insert_with(AgentState::default),
        }
    }

    /// Whether the session has been idle for longer than `ttl` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.last_active_at > ttl
    }
}

/// Storage for sessions keyed by sender.
///
/// The in-memory map is the default; a key-value store can be substituted
/// without touching the state machines. Callers serialize access per turn,
/// so implementations only need per-call atomicity.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for `sender`, creating it if missing, and stamp
    /// `last_active_at = now`.
    async fn get_or_create(&self, sender: &str, now: DateTime<Utc>) -> Session;

    /// Load the session for `sender` without touching it.
    async fn get(&self, sender: &str) -> Option<Session>;

    /// Store `session` for `sender`, replacing any previous value.
    async fn put(&self, sender: &str, session: Session);

    /// Refresh `last_active_at`. Returns `false` if there is no session.
    async fn touch(&self, sender: &str, now: DateTime<Utc>) -> bool;

    /// Evict every session idle for longer than `ttl`. Returns the count.
    async fn sweep_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> usize;

    /// Number of live sessions.
    async fn session_count(&self) -> usize;
}
