use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/v1/hierarchy/sync — fire-and-forget resync behind the cooldown.
pub async fn trigger_sync(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let triggered = app.scheduler.trigger();
    Ok(Json(json!({ "triggered": triggered })))
}
