//! Outbound delivery through the Twilio Messages REST API.
//!
//! Used for out-of-band replies only; in-turn replies ride back on the
//! webhook response as TwiML. Transport errors, 429 and 5xx responses are
//! retried with exponential backoff and jitter; other rejections are not.

use crate::config::TwilioSettings;
use async_trait::async_trait;
use std::time::Duration;
use textdesk_core::outbound::{OutboundError, OutboundSender};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Maximum retries after the first attempt.
pub const TWILIO_API_MAX_RETRIES: usize = 3;
/// First backoff delay in milliseconds.
pub const TWILIO_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling in milliseconds.
pub const TWILIO_API_MAX_BACKOFF_MS: u64 = 5_000;

/// Sends SMS through Twilio.
#[derive(Debug, Clone)]
pub struct TwilioSender {
    client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    max_retries: usize,
    initial_backoff_ms: u64,
}

impl TwilioSender {
    /// Create a sender from settings.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError::Config` if the account SID, auth token or
    /// sending number is missing.
    pub fn new(settings: &TwilioSettings) -> Result<Self, OutboundError> {
        let missing: Vec<&str> = [
            ("TWILIO_ACCOUNT_SID", &settings.twilio_account_sid),
            ("TWILIO_AUTH_TOKEN", &settings.twilio_auth_token),
            ("TWILIO_FROM_NUMBER", &settings.twilio_from_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(OutboundError::Config(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let base = settings.twilio_api_base.trim_end_matches('/');
        Ok(Self {
            client: reqwest::Client::new(),
            messages_url: format!(
                "{base}/2010-04-01/Accounts/{}/Messages.json",
                settings.twilio_account_sid
            ),
            account_sid: settings.twilio_account_sid.clone(),
            auth_token: settings.twilio_auth_token.clone(),
            from: settings.twilio_from_number.clone(),
            max_retries: TWILIO_API_MAX_RETRIES,
            initial_backoff_ms: TWILIO_API_INITIAL_BACKOFF_MS,
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retries(mut self, max_retries: usize, initial_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff_ms = initial_backoff_ms.max(1);
        self
    }

    async fn post_once(&self, to: &str, body: &str) -> Result<(), OutboundError> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| OutboundError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(OutboundError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn is_retryable(error: &OutboundError) -> bool {
    match error {
        OutboundError::Transport(_) => true,
        OutboundError::Rejected { status, .. } => *status == 429 || *status >= 500,
        OutboundError::Config(_) => false,
    }
}

#[async_trait]
impl OutboundSender for TwilioSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), OutboundError> {
        // Delays: initial, 2x, 4x ... capped, each scaled by jitter
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(self.initial_backoff_ms / 2 + 1)
            .max_delay(Duration::from_millis(TWILIO_API_MAX_BACKOFF_MS))
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(retry_strategy, || self.post_once(to, body), |e: &OutboundError| {
            let retry = is_retryable(e);
            if retry {
                debug!(to = %to, error = %e, "Retrying Twilio send");
            }
            retry
        })
        .await
        .map_err(|e| {
            warn!(to = %to, error = %e, "Twilio send failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TwilioSettings {
        TwilioSettings {
            twilio_account_sid: "AC00000000000000000000000000000000".to_string(),
            twilio_auth_token: "secret".to_string(),
            twilio_from_number: "+15550001111".to_string(),
            twilio_api_base: "http://127.0.0.1:9/".to_string(),
            ..TwilioSettings::default()
        }
    }

    #[test]
    fn test_messages_url() {
        let sender = TwilioSender::new(&settings()).expect("valid settings");
        assert_eq!(
            sender.messages_url,
            "http://127.0.0.1:9/2010-04-01/Accounts/AC00000000000000000000000000000000/Messages.json"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let settings = TwilioSettings {
            twilio_auth_token: String::new(),
            twilio_from_number: " ".to_string(),
            ..settings()
        };
        let err = TwilioSender::new(&settings).expect_err("missing credentials");
        let text = err.to_string();
        assert!(text.contains("TWILIO_AUTH_TOKEN"));
        assert!(text.contains("TWILIO_FROM_NUMBER"));
        assert!(!text.contains("TWILIO_ACCOUNT_SID"));
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable(&OutboundError::Transport("reset".to_string())));
        assert!(is_retryable(&OutboundError::Rejected {
            status: 503,
            message: String::new()
        }));
        assert!(is_retryable(&OutboundError::Rejected {
            status: 429,
            message: String::new()
        }));
        assert!(!is_retryable(&OutboundError::Rejected {
            status: 400,
            message: String::new()
        }));
        assert!(!is_retryable(&OutboundError::Config("x".to_string())));
    }
}
