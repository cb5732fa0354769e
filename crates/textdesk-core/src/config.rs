//! Configuration and settings management
//!
//! Loads router settings from config files and environment variables.

use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default rate-limit window length in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Default number of requests allowed per window.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 4;
/// Default session time-to-live in seconds (12 hours).
pub const SESSION_TTL_SECS: u64 = 12 * 60 * 60;
/// Default delay before a scheduled task starts running.
pub const TASK_DELAY_SECS: u64 = 5;

/// Build the layered configuration shared by every crate.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__`-prefixed environment variables, then plain
/// environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if any present source fails to parse.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Router settings: rate limiting, session expiry and task scheduling.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    /// Length of the rate-limit window in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// Requests permitted per sender within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,
    /// Idle time after which a session is swept.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Simulated delay before a scheduled task runs. Mostly a test knob.
    #[serde(default = "default_task_delay_secs")]
    pub task_delay_secs: u64,
}

const fn default_rate_limit_window_secs() -> u64 {
    RATE_LIMIT_WINDOW_SECS
}

const fn default_rate_limit_max_requests() -> u32 {
    RATE_LIMIT_MAX_REQUESTS
}

const fn default_session_ttl_secs() -> u64 {
    SESSION_TTL_SECS
}

const fn default_task_delay_secs() -> u64 {
    TASK_DELAY_SECS
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            rate_limit_window_secs: RATE_LIMIT_WINDOW_SECS,
            rate_limit_max_requests: RATE_LIMIT_MAX_REQUESTS,
            session_ttl_secs: SESSION_TTL_SECS,
            task_delay_secs: TASK_DELAY_SECS,
        }
    }
}

impl RouterSettings {
    /// Load settings from config files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Rate-limit window as a timestamp delta.
    #[must_use]
    pub fn rate_limit_window(&self) -> TimeDelta {
        secs_to_delta(self.rate_limit_window_secs)
    }

    /// Session time-to-live as a timestamp delta.
    #[must_use]
    pub fn session_ttl(&self) -> TimeDelta {
        secs_to_delta(self.session_ttl_secs)
    }

    /// Delay applied before a scheduled task runs.
    #[must_use]
    pub const fn task_delay(&self) -> Duration {
        Duration::from_secs(self.task_delay_secs)
    }
}

/// Saturates instead of panicking on absurd configured values.
fn secs_to_delta(secs: u64) -> TimeDelta {
    TimeDelta::from_std(Duration::from_secs(secs)).unwrap_or(TimeDelta::MAX)
}
