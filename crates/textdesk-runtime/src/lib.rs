#![deny(missing_docs)]
//! Textdesk runtime.
//!
//! Transport-agnostic orchestration: the per-turn router and the bridge
//! that reports long-running task completions back to senders.

/// Background task scheduling and completion handling.
pub mod bridge;
/// Turn serialization shared by the router and the bridge.
pub mod gate;
/// Inbound message routing.
pub mod router;

pub use bridge::{CompletionBridge, CompletionFn};
pub use gate::TurnGate;
pub use router::{AgentRouter, RouterDeps, RouterStats, Turn, TurnKind};
