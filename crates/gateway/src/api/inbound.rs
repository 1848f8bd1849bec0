//! Inbound boundary — the normalized envelope that chat connectors post.
//!
//! `POST /v1/inbound` is the single entry point for all transports. The
//! handler does constant-time admission work only: an admitted message is
//! handed to the background dispatcher and the request returns at once.
//! The transport may redeliver the same event; the admission controller
//! is exactly the defense for that.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::runtime::admission::Admission;
use crate::runtime::notifier;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    /// Stable user identifier from the transport.
    pub user_id: String,
    /// The user's message text.
    pub text: String,
    /// Display name from the transport; personalization fallback when no
    /// profile is on file.
    #[serde(default)]
    pub sender_name: Option<String>,
}

pub async fn inbound(
    State(state): State<AppState>,
    Json(body): Json<InboundEnvelope>,
) -> impl IntoResponse {
    if body.user_id.trim().is_empty() || body.text.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": "user_id and text are required" })),
        )
            .into_response();
    }

    let now = chrono::Utc::now();
    match state.admission.decide(&body.user_id, now) {
        Admission::Start => {
            state.dispatcher.dispatch(&body.user_id, &body.text);
            Json(serde_json::json!({ "queued": true })).into_response()
        }
        Admission::WaitNotice => {
            let first_name = state
                .profiles
                .first_name(&body.user_id)
                .map(str::to_owned)
                .or_else(|| {
                    body.sender_name
                        .as_deref()
                        .and_then(|n| n.split_whitespace().next())
                        .map(str::to_owned)
                });

            // Off the request path — delivery may be slow.
            let sender = state.sender.clone();
            let user_id = body.user_id.clone();
            tokio::spawn(async move {
                let text = notifier::wait_notice(first_name.as_deref());
                sender.send(&user_id, &text).await;
            });

            Json(serde_json::json!({ "queued": false, "notice": true })).into_response()
        }
        Admission::Suppress => {
            Json(serde_json::json!({ "queued": false, "suppressed": true })).into_response()
        }
    }
}
