//! Outbound message delivery.
//!
//! Transport-agnostic: the completion bridge only needs "send text to
//! recipient". Delivery is fire-and-forget from the caller's point of view;
//! errors are returned so they can be logged, never retried by the core.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while delivering an outbound message
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Network or protocol failure talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),
    /// Provider accepted the request but refused the message
    #[error("Provider rejected message ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the provider
        status: u16,
        /// Error message from the provider
        message: String,
    },
    /// Missing credentials or sender number
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Sends a text message to a recipient outside of any webhook response.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Deliver `body` to `to`.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), OutboundError>;
}
