use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::path::{Path, PathBuf};

use crate::state::AppState;
use autonomy_core::io;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// OverrideStore
// ---------------------------------------------------------------------------

/// Append-only JSONL store for raw webhook events, kept so manual overrides
/// and external edits can be replayed or inspected later.
pub struct OverrideStore {
    path: PathBuf,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add(&self, event: &str, payload: &Value) -> autonomy_core::Result<()> {
        io::append_jsonl(
            &self.path,
            &json!({
                "event": event,
                "payload": payload,
                "timestamp": Utc::now(),
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Signature verification
// ---------------------------------------------------------------------------

/// Verify GitHub's `X-Hub-Signature-256` header. An empty secret disables
/// verification; a configured secret rejects missing or malformed headers.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    if secret.is_empty() {
        return true;
    }
    let Some(sig) = signature else {
        return false;
    };
    let Some(hex_sig) = sig.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(raw) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    // Constant-time comparison.
    mac.verify_slice(&raw).is_ok()
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Events whose payloads can change issue hierarchy.
fn qualifies_for_resync(event: &str) -> bool {
    matches!(event, "issues" | "issue_comment")
}

/// POST /webhook/github — verify, rate-limit, persist, maybe resync.
pub async fn github_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());
    if !verify_signature(&app.webhook_secret, &body, signature) {
        return Err(reject(StatusCode::BAD_REQUEST, "invalid signature"));
    }

    if !app.limiter.try_acquire() {
        return Err(reject(StatusCode::TOO_MANY_REQUESTS, "rate limited"));
    }

    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return Err(reject(StatusCode::BAD_REQUEST, "invalid payload"));
    };
    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let store = app.overrides.clone();
    let stored_event = event.clone();
    let stored = tokio::task::spawn_blocking(move || store.add(&stored_event, &payload)).await;
    match stored {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!("failed to store webhook event: {e}");
            return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "storage failed"));
        }
        Err(e) => {
            return Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("task join error: {e}"),
            ));
        }
    }

    if qualifies_for_resync(&event) {
        app.scheduler.trigger();
    }

    Ok(Json(json!({ "success": true })))
}

fn reject(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": detail })))
}
