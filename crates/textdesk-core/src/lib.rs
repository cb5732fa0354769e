#![deny(missing_docs)]
//! Textdesk core library.
//!
//! Conversation state, agent state machines, rate limiting and the
//! collaborator traits the SMS router is built on.

/// Agent state machines.
pub mod agent;
/// Sender authorization.
pub mod auth;
/// Time source abstraction.
pub mod clock;
/// Configuration management.
pub mod config;
/// Agent intent detection.
pub mod intent;
/// Outbound message delivery.
pub mod outbound;
/// Per-sender fixed-window rate limiting.
pub mod rate_limit;
/// Per-sender conversation sessions.
pub mod session;
/// Long-running task requests and runners.
pub mod task;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{AgentKind, AgentState, Stage, Step};
pub use session::{InMemorySessionStore, Session, SessionStore};
