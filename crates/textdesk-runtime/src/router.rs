//! Inbound message routing
//!
//! One call to [`AgentRouter::handle`] is one conversational turn:
//!
//! 1. sweep expired sessions and rate windows,
//! 2. reject a missing sender,
//! 3. reject senders the authorizer refuses,
//! 4. throttle senders over the rate limit,
//! 5. load or create the session,
//! 6. apply an explicit agent switch,
//! 7. on first contact, ask which agent to talk to,
//! 8. run the active agent's transition and schedule its side effect,
//! 9. return the replies.
//!
//! Steps 2-4 never touch session state. Nothing escapes a turn as an
//! error; every failure becomes a reply.

use crate::bridge::CompletionBridge;
use crate::gate::TurnGate;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use textdesk_core::agent::{self, AgentKind};
use textdesk_core::auth::Authorizer;
use textdesk_core::clock::Clock;
use textdesk_core::config::RouterSettings;
use textdesk_core::intent::IntentClassifier;
use textdesk_core::rate_limit::RateLimiter;
use textdesk_core::session::SessionStore;
use textdesk_core::task::TaskRequest;
use tracing::{debug, info, warn};

/// Reply when the transport delivered no sender.
pub const MISSING_SENDER_REPLY: &str = "We couldn't tell who sent that message.";
/// Reply to senders that are not on the allow-list.
pub const UNAUTHORIZED_REPLY: &str =
    "Sorry, this number isn't on the list yet. Ask your account manager for access.";
/// Reply to senders over the rate limit.
pub const RATE_LIMITED_REPLY: &str =
    "You're sending messages a little fast. Give it a minute and try again.";
/// First-contact prompt.
pub const AGENT_PROMPT: &str =
    "Hi! Who would you like to talk to? Text \"Percy\" for business advice or \"Coach\" for training help.";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// The active agent handled the message.
    Conversation,
    /// First contact; the sender was asked to pick an agent.
    AgentPrompt,
    /// No sender identifier.
    MissingSender,
    /// Sender is not authorized.
    Unauthorized,
    /// Sender exceeded the rate limit.
    RateLimited,
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// How the turn ended.
    pub kind: TurnKind,
    /// Replies for this turn, in order.
    pub replies: Vec<String>,
}

impl Turn {
    fn single(kind: TurnKind, reply: impl Into<String>) -> Self {
        Self {
            kind,
            replies: vec![reply.into()],
        }
    }
}

/// Counters exposed for health and statistics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Live sessions.
    pub sessions: usize,
    /// Senders with an open rate window.
    pub rate_windows: usize,
    /// Tasks still running.
    pub pending_tasks: usize,
}

/// Collaborators the router is built from.
pub struct RouterDeps {
    /// Router settings (session TTL is read from here).
    pub settings: RouterSettings,
    /// Session storage.
    pub store: Arc<dyn SessionStore>,
    /// Per-sender rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// Task scheduler; its gate serializes turns.
    pub bridge: Arc<CompletionBridge>,
    /// Allow-list predicate.
    pub authorizer: Arc<dyn Authorizer>,
    /// Agent switch detection.
    pub classifier: Arc<dyn IntentClassifier>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Top-level entry point for inbound messages.
pub struct AgentRouter {
    session_ttl: TimeDelta,
    store: Arc<dyn SessionStore>,
    limiter: Arc<RateLimiter>,
    bridge: Arc<CompletionBridge>,
    authorizer: Arc<dyn Authorizer>,
    classifier: Arc<dyn IntentClassifier>,
    clock: Arc<dyn Clock>,
    gate: TurnGate,
}

impl AgentRouter {
    /// Create a router. Turns share the bridge's gate.
    #[must_use]
    pub fn new(deps: RouterDeps) -> Self {
        let gate = deps.bridge.gate();
        Self {
            session_ttl: deps.settings.session_ttl(),
            store: deps.store,
            limiter: deps.limiter,
            bridge: deps.bridge,
            authorizer: deps.authorizer,
            classifier: deps.classifier,
            clock: deps.clock,
            gate,
        }
    }

    /// Handle one inbound message and return the replies.
    pub async fn handle(&self, sender: &str, body: &str) -> Vec<String> {
        self.handle_turn(sender, body).await.replies
    }

    /// Handle one inbound message and report how the turn ended.
    pub async fn handle_turn(&self, sender: &str, body: &str) -> Turn {
        let _turn = self.gate.enter().await;
        let now = self.clock.now();
        self.sweep(now).await;

        let sender = sender.trim();
        if sender.is_empty() {
            warn!("Inbound message without sender");
            return Turn::single(TurnKind::MissingSender, MISSING_SENDER_REPLY);
        }

        if !self.authorizer.is_authorized(sender).await {
            info!(sender = %sender, "Unauthorized sender");
            return Turn::single(TurnKind::Unauthorized, UNAUTHORIZED_REPLY);
        }

        let decision = self.limiter.check(sender, now).await;
        if !decision.permitted {
            info!(sender = %sender, count = decision.count, "Sender throttled");
            return Turn::single(TurnKind::RateLimited, RATE_LIMITED_REPLY);
        }

        let mut session = self.store.get_or_create(sender, now).await;
        let first_contact = session.active_agent.is_none();

        if let Some(requested) = self.classifier.classify(body) {
            if session.active_agent != Some(requested) {
                info!(sender = %sender, from = ?session.active_agent, to = %requested, "Switching agent");
            }
            session.active_agent = Some(requested);
        }

        let active = match (session.active_agent, first_contact) {
            (Some(active), false) => active,
            _ => {
                debug!(sender = %sender, selected = ?session.active_agent, "First contact");
                self.store.put(sender, session).await;
                return Turn::single(TurnKind::AgentPrompt, AGENT_PROMPT);
            }
        };

        let state = session.engage(active);
        let step = agent::step(active, state, body);
        debug!(
            sender = %sender,
            agent = %active,
            from = ?state.stage,
            to = ?step.state.stage,
            "Agent step"
        );
        *state = step.state;
        let name = state.name.clone();
        self.store.put(sender, session).await;

        if let Some(effect) = step.side_effect {
            let request = TaskRequest::new(sender, active, effect.kind, effect.payload, name);
            self.bridge.schedule(request, completion_for(active));
        }

        Turn::single(TurnKind::Conversation, step.reply)
    }

    /// Current counters.
    pub async fn stats(&self) -> RouterStats {
        RouterStats {
            sessions: self.store.session_count().await,
            rate_windows: self.limiter.tracked().await,
            pending_tasks: self.bridge.pending(),
        }
    }

    async fn sweep(&self, now: DateTime<Utc>) {
        let sessions = self.store.sweep_expired(now, self.session_ttl).await;
        let windows = self.limiter.sweep_expired(now).await;
        if sessions > 0 || windows > 0 {
            debug!(sessions, windows, "Swept expired state");
        }
    }
}

fn completion_for(agent: AgentKind) -> crate::bridge::CompletionFn {
    match agent {
        AgentKind::Business => agent::business::completion_reply,
        AgentKind::Coach => agent::coach::completion_reply,
    }
}
