//! Inbound webhook
//!
//! Twilio posts each inbound SMS as a form to `/sms` and sends whatever
//! TwiML we answer with back to the sender. `/healthz` and `/stats` are
//! for operators.

use crate::rejection_cooldown::RejectionCooldown;
use axum::extract::{Form, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textdesk_runtime::{AgentRouter, TurnKind};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    /// Conversation router.
    pub router: Arc<AgentRouter>,
    /// Cooldown for rejection replies.
    pub rejections: Arc<RejectionCooldown>,
}

/// Fields of Twilio's inbound message form that the router needs.
#[derive(Debug, Default, Deserialize)]
pub struct InboundSms {
    /// Sender number.
    #[serde(rename = "From", default)]
    pub from: String,
    /// Message text.
    #[serde(rename = "Body", default)]
    pub body: String,
}

/// Counters returned by `/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Live sessions.
    pub sessions: usize,
    /// Senders with an open rate window.
    pub rate_windows: usize,
    /// Tasks still running.
    pub pending_tasks: usize,
    /// Rejection replies suppressed by the cooldown.
    pub silenced_rejections: u64,
    /// Senders currently cooling down.
    pub rejection_cooldowns: u64,
}

/// Build the webhook application.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/sms", post(inbound_sms))
        .route("/healthz", get(healthz))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn inbound_sms(State(state): State<AppState>, Form(sms): Form<InboundSms>) -> Response {
    let turn = state.router.handle_turn(&sms.from, &sms.body).await;

    let replies = if turn.kind == TurnKind::Unauthorized {
        let sender = sms.from.trim();
        if state.rejections.admit(sender).await {
            info!(sender = %sender, "Sending access denied reply");
            turn.replies
        } else {
            Vec::new()
        }
    } else {
        turn.replies
    };

    debug!(kind = ?turn.kind, replies = replies.len(), "Webhook turn done");
    twiml(&replies)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let router = state.router.stats().await;
    Json(StatsResponse {
        sessions: router.sessions,
        rate_windows: router.rate_windows,
        pending_tasks: router.pending_tasks,
        silenced_rejections: state.rejections.silenced(),
        rejection_cooldowns: state.rejections.cooling_down(),
    })
}

fn twiml(replies: &[String]) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        render_twiml(replies),
    )
        .into_response()
}

/// Render replies as a TwiML document, one `<Message>` per reply.
#[must_use]
pub fn render_twiml(replies: &[String]) -> String {
    if replies.is_empty() {
        return r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#.to_string();
    }
    let messages: String = replies
        .iter()
        .map(|reply| format!("<Message>{}</Message>", html_escape::encode_text(reply)))
        .collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><Response>{messages}</Response>"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty() {
        assert_eq!(
            render_twiml(&[]),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#
        );
    }

    #[test]
    fn test_render_escapes_text() {
        let xml = render_twiml(&["Fish & <chips>".to_string(), "two".to_string()]);
        assert!(xml.ends_with(
            "<Response><Message>Fish &amp; &lt;chips&gt;</Message><Message>two</Message></Response>"
        ));
    }
}
