use crate::config::{get_unauthorized_cache_max_size, get_unauthorized_cooldown, ServerSettings};
use crate::outbound::TwilioSender;
use crate::rejection_cooldown::RejectionCooldown;
use crate::webhook::{self, AppState};
use anyhow::{Context, Result};
use std::sync::Arc;
use textdesk_core::clock::SystemClock;
use textdesk_core::intent::KeywordClassifier;
use textdesk_core::outbound::OutboundSender;
use textdesk_core::rate_limit::RateLimiter;
use textdesk_core::session::InMemorySessionStore;
use textdesk_core::task::TaskRunner;
use textdesk_runtime::{AgentRouter, CompletionBridge, RouterDeps, TurnGate};
use tracing::{error, info, warn};

/// Everything the HTTP server runs on.
pub struct Server {
    /// Webhook application.
    pub app: axum::Router,
    /// Bridge to drain on shutdown.
    pub bridge: Arc<CompletionBridge>,
}

/// Wire the router, bridge and webhook together.
pub fn build_server(
    settings: &ServerSettings,
    outbound: Arc<dyn OutboundSender>,
    runner: Arc<dyn TaskRunner>,
) -> Server {
    let store = Arc::new(InMemorySessionStore::new());
    let bridge = Arc::new(CompletionBridge::new(
        store.clone(),
        outbound,
        runner,
        TurnGate::new(),
        settings.router.task_delay(),
    ));

    let allowed = settings.twilio.allowed_senders();
    if allowed.is_empty() {
        warn!("ALLOWED_SENDERS is empty, every sender will be rejected");
    } else {
        info!(count = allowed.len(), "Allow-list loaded");
    }

    let router = AgentRouter::new(RouterDeps {
        settings: settings.router.as_ref().clone(),
        store,
        limiter: Arc::new(RateLimiter::from_settings(&settings.router)),
        bridge: bridge.clone(),
        authorizer: Arc::new(allowed),
        classifier: Arc::new(KeywordClassifier::default()),
        clock: Arc::new(SystemClock),
    });

    let app = webhook::app(AppState {
        router: Arc::new(router),
        rejections: init_rejection_cooldown(),
    });

    Server { app, bridge }
}

/// Run the SMS webhook server until Ctrl+C, then wait for in-flight tasks.
///
/// # Errors
///
/// Returns an error if Twilio credentials are missing or the listen
/// address cannot be bound.
pub async fn run_server(settings: ServerSettings, runner: Arc<dyn TaskRunner>) -> Result<()> {
    let outbound = Arc::new(
        TwilioSender::new(&settings.twilio).context("Twilio sender is not configured")?,
    );
    info!("Twilio sender initialized.");

    let Server { app, bridge } = build_server(&settings, outbound, runner);

    let bind_addr = settings.twilio.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    info!("Webhook server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let pending = bridge.pending();
    if pending > 0 {
        info!(pending, "Waiting for in-flight tasks");
    }
    bridge.drain().await;
    info!("Server stopped.");
    Ok(())
}

fn init_rejection_cooldown() -> Arc<RejectionCooldown> {
    let cooldown = get_unauthorized_cooldown();
    let max_size = get_unauthorized_cache_max_size();

    info!(
        "Initializing rejection cooldown (cooldown: {}s, max_size: {})",
        cooldown, max_size
    );

    Arc::new(RejectionCooldown::new(cooldown, max_size))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
