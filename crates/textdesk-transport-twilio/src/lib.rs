#![deny(missing_docs)]
//! Twilio SMS transport for Textdesk.

/// Twilio transport configuration.
pub mod config;
/// Access-denied reply throttling.
pub mod rejection_cooldown;
/// Outbound delivery through the Twilio Messages API.
pub mod outbound;
/// HTTP server entrypoint.
pub mod runner;
/// Inbound webhook and TwiML rendering.
pub mod webhook;

pub use outbound::TwilioSender;
pub use rejection_cooldown::RejectionCooldown;
