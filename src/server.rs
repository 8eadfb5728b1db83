//! HTTP surface: the Slack Events API webhook, the slash command, dialog
//! submissions and the scheduled start trigger.
//!
//! Handlers are thin. They decode the request, hand it to the [`Engine`]
//! or the [`SettingStore`], and map the outcome onto a status code: expected
//! skips are `200`, bad input `400`, and storage or Slack failures `500` so
//! the caller retries.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::consts::{SETTING_CALLBACK_ID, SETTING_FINISHED};
use crate::engine::Engine;
use crate::setting::{Setting, SettingField, SettingStore};
use crate::slack::dialog::{self, MEMBERS_FIELD, QUESTIONS_FIELD, TARGET_CHANNEL_FIELD};
use crate::slack::events::Envelope;
use crate::slack::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::slack::{Directory, Messenger};
use crate::standup::StandupError;

/// Slack payloads are small; anything bigger is not from Slack.
const MAX_BODY_BYTES: usize = 1024 * 1024;

const USAGE: &str = "Usage: `/standup setting` to configure this channel's stand-up.";

/// Everything the handlers share.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub settings: Arc<dyn SettingStore>,
    pub messenger: Arc<dyn Messenger>,
    pub directory: Arc<dyn Directory>,
    /// When set, every `/slack/*` request must carry a valid signature.
    pub signing_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let slack = Router::new()
        .route("/events", post(events))
        .route("/commands", post(commands))
        .route("/interactive", post(interactive))
        .layer(middleware::from_fn_with_state(state.clone(), verify_signature));

    Router::new()
        .route("/health", get(health))
        .route("/start", post(start))
        .nest("/slack", slack)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

fn status_for(e: &StandupError) -> StatusCode {
    if e.is_expected() {
        StatusCode::OK
    } else if matches!(e, StandupError::InvalidSetting(_)) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(e: StandupError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        error!(error = %e, "request failed");
    } else {
        debug!(error = %e, "request skipped");
    }
    (status, e.to_string()).into_response()
}

async fn verify_signature(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(secret) = state.signing_secret.as_deref() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };

    let header_str = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    let verified = match (header_str(TIMESTAMP_HEADER), header_str(SIGNATURE_HEADER)) {
        (Some(ts), Some(sig)) => {
            signature::verify(secret, ts, &bytes, sig, chrono::Utc::now().timestamp())
        }
        _ => Err(anyhow::anyhow!("missing signature headers")),
    };
    if let Err(e) = verified {
        warn!(path = %parts.uri.path(), error = %e, "rejected unsigned request");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn events(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed event payload");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        Envelope::EventCallback { event, event_id } => {
            let Some(message) = event.into_member_message() else {
                return StatusCode::OK.into_response();
            };

            match state.directory.bot_user_id().await {
                Ok(bot) if bot == message.user_id => return StatusCode::OK.into_response(),
                Ok(_) => {}
                Err(e) => return error_response(StandupError::Delivery(e)),
            }

            match state.engine.handle_message(&message).await {
                Ok(handled) => {
                    debug!(event_id = ?event_id, user_id = %message.user_id, ?handled, "handled message");
                    StatusCode::OK.into_response()
                }
                Err(e) => error_response(e),
            }
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    #[serde(default)]
    pub trigger_id: String,
}

async fn commands(State(state): State<AppState>, Form(command): Form<SlashCommand>) -> Response {
    debug!(text = %command.text, channel_id = %command.channel_id, "slash command");

    if command.text.trim() != "setting" {
        return (StatusCode::OK, USAGE).into_response();
    }

    let current = match state.settings.get(&command.channel_id).await {
        Ok(current) => current,
        Err(e) => return error_response(StandupError::Storage(e)),
    };
    let dialog = dialog::setting_dialog(&command.channel_id, current.as_ref());
    match state.messenger.open_dialog(&command.trigger_id, &dialog).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(StandupError::Delivery(e)),
    }
}

/// The dialog element a validation failure belongs to. The dialog has one
/// channel picker, which sets both the key and the summary channel.
fn dialog_field(field: SettingField) -> &'static str {
    match field {
        SettingField::Questions => QUESTIONS_FIELD,
        SettingField::Members => MEMBERS_FIELD,
        SettingField::Channel | SettingField::SummaryChannel => TARGET_CHANNEL_FIELD,
    }
}

#[derive(Debug, Deserialize)]
struct InteractiveForm {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct DialogSubmission {
    callback_id: String,
    #[serde(default)]
    submission: HashMap<String, String>,
    channel: ChannelRef,
}

#[derive(Debug, Deserialize)]
struct ChannelRef {
    id: String,
}

async fn interactive(State(state): State<AppState>, Form(form): Form<InteractiveForm>) -> Response {
    let submission: DialogSubmission = match serde_json::from_str(&form.payload) {
        Ok(submission) => submission,
        Err(e) => {
            warn!(error = %e, "malformed interactive payload");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    if submission.callback_id != SETTING_CALLBACK_ID {
        return StatusCode::OK.into_response();
    }

    let field = |name: &str| submission.submission.get(name).map(String::as_str).unwrap_or("");
    let setting = match Setting::from_submission(
        field(QUESTIONS_FIELD),
        field(MEMBERS_FIELD),
        field(TARGET_CHANNEL_FIELD),
    ) {
        Ok(setting) => setting,
        Err(e) => {
            // Slack shows these next to the dialog instead of closing it.
            let errors = serde_json::json!({
                "errors": [{ "name": dialog_field(e.field), "error": e.to_string() }]
            });
            return (StatusCode::OK, Json(errors)).into_response();
        }
    };

    if let Err(e) = state.settings.put(&setting).await {
        return error_response(StandupError::Storage(e));
    }
    info!(channel_id = %setting.channel_id, members = setting.member_ids.len(), "saved setting");

    match state
        .messenger
        .post_text(&submission.channel.id, SETTING_FINISHED)
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => error_response(StandupError::Delivery(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub target_channel_id: String,
}

async fn start(State(state): State<AppState>, Json(request): Json<StartRequest>) -> Response {
    if request.target_channel_id.is_empty() {
        info!("start trigger without target_channel_id");
        return StatusCode::OK.into_response();
    }

    match state.engine.start(&request.target_channel_id).await {
        Ok(report) => {
            info!(
                channel_id = %request.target_channel_id,
                initialized = report.initialized.len(),
                existing = report.existing.len(),
                failed = report.failed.len(),
                "start finished"
            );
            let status = if report.failed.is_empty() {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(report)).into_response()
        }
        Err(e) => error_response(e),
    }
}
