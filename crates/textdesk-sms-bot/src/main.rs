use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use textdesk_core::config::RouterSettings;
use textdesk_core::task::SimulatedTaskRunner;
use textdesk_transport_twilio::config::{ServerSettings, TwilioSettings};
use textdesk_transport_twilio::runner::run_server;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    account_sid: Regex,
    auth_token_env: Regex,
    auth_token_field: Regex,
    basic_auth: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            account_sid: Regex::new(r"\bAC[0-9a-fA-F]{32}\b")?,
            auth_token_env: Regex::new(r"TWILIO_AUTH_TOKEN=[^\s&]+")?,
            auth_token_field: Regex::new(r#"twilio_auth_token: "[^"]*""#)?,
            basic_auth: Regex::new(r"(?i)(authorization:\s*basic\s+)[A-Za-z0-9+/=]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .account_sid
            .replace_all(&output, "[TWILIO_SID]")
            .to_string();
        output = self
            .auth_token_env
            .replace_all(&output, "TWILIO_AUTH_TOKEN=[MASKED]")
            .to_string();
        output = self
            .auth_token_field
            .replace_all(&output, r#"twilio_auth_token: "[MASKED]""#)
            .to_string();
        output = self
            .basic_auth
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may be shorter or longer.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Patterns must exist before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Textdesk SMS bot...");

    let settings = init_settings();

    if let Err(e) = run_server(settings, Arc::new(SimulatedTaskRunner)).await {
        error!("Server exited with error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "textdesk_core=info,textdesk_runtime=info,textdesk_transport_twilio=info,textdesk_sms_bot=info,tower_http=warn,hyper=warn,reqwest=warn,tokio=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> ServerSettings {
    let router_settings = match RouterSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load router configuration: {}", e);
            std::process::exit(1);
        }
    };
    let twilio_settings = match TwilioSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load twilio configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        rate_limit_window_secs = router_settings.rate_limit_window_secs,
        rate_limit_max_requests = router_settings.rate_limit_max_requests,
        session_ttl_secs = router_settings.session_ttl_secs,
        task_delay_secs = router_settings.task_delay_secs,
        "Configuration loaded successfully."
    );
    ServerSettings::new(router_settings, twilio_settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_twilio_secrets() {
        let patterns = RedactionPatterns::new().expect("valid patterns");
        let line = concat!(
            "POST /2010-04-01/Accounts/AC0123456789abcdef0123456789abcdef/Messages.json ",
            "TWILIO_AUTH_TOKEN=s3cr3t&x=1 ",
            "twilio_auth_token: \"s3cr3t\" ",
            "Authorization: Basic QUM6czNjcjN0"
        );
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("AC0123456789abcdef"));
        assert!(!redacted.contains("s3cr3t"));
        assert!(!redacted.contains("QUM6czNjcjN0"));
        assert!(redacted.contains("Accounts/[TWILIO_SID]/Messages.json"));
        assert!(redacted.contains("Authorization: Basic [MASKED]"));
    }

    #[test]
    fn test_writer_reports_original_length() {
        let patterns = Arc::new(RedactionPatterns::new().expect("valid patterns"));
        let mut writer = RedactingWriter::new(Vec::new(), patterns);
        let input = b"TWILIO_AUTH_TOKEN=abc";
        let written = writer.write(input).expect("write");
        assert_eq!(written, input.len());
        assert_eq!(writer.inner, b"TWILIO_AUTH_TOKEN=[MASKED]".to_vec());
    }
}
