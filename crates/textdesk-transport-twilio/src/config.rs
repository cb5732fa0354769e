//! Twilio transport settings.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textdesk_core::auth::AllowList;
use textdesk_core::config::RouterSettings;

/// Default Twilio REST API base URL.
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
/// Default listen address for the webhook server.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Twilio transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TwilioSettings {
    /// Twilio account SID (`AC...`).
    #[serde(default)]
    pub twilio_account_sid: String,
    /// Twilio auth token.
    #[serde(default)]
    pub twilio_auth_token: String,
    /// Number outbound messages are sent from.
    #[serde(default)]
    pub twilio_from_number: String,
    /// REST API base URL, overridable for testing.
    #[serde(default = "default_api_base")]
    pub twilio_api_base: String,
    /// Address the webhook server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Comma-separated list of allowed sender numbers.
    #[serde(rename = "allowed_senders")]
    pub allowed_senders_str: Option<String>,
}

fn default_api_base() -> String {
    DEFAULT_TWILIO_API_BASE.to_string()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

impl Default for TwilioSettings {
    fn default() -> Self {
        Self {
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from_number: String::new(),
            twilio_api_base: default_api_base(),
            bind_addr: default_bind_addr(),
            allowed_senders_str: None,
        }
    }
}

impl TwilioSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        textdesk_core::config::build_config()?.try_deserialize()
    }

    /// Allow-list built from `allowed_senders`. Empty when unset.
    #[must_use]
    pub fn allowed_senders(&self) -> AllowList {
        self.allowed_senders_str
            .as_deref()
            .map(AllowList::parse)
            .unwrap_or_default()
    }
}

/// Combined settings used by the server.
#[derive(Clone)]
pub struct ServerSettings {
    /// Router knobs.
    pub router: Arc<RouterSettings>,
    /// Twilio-specific settings.
    pub twilio: Arc<TwilioSettings>,
}

impl ServerSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(router: RouterSettings, twilio: TwilioSettings) -> Self {
        Self {
            router: Arc::new(router),
            twilio: Arc::new(twilio),
        }
    }
}

/// Cooldown period (seconds) between rejection replies to the same sender.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    std::env::var("UNAUTHORIZED_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    std::env::var("UNAUTHORIZED_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(UNAUTHORIZED_CACHE_MAX_SIZE)
}
