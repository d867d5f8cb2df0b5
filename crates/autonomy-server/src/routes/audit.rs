use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/v1/audit/log — full audit trail, oldest first.
pub async fn get_log(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let audit = app.audit.clone();
    let entries = tokio::task::spawn_blocking(move || audit.iter_logs())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    Ok(Json(json!(entries)))
}

/// POST /api/v1/audit/undo/{hash} — reverse an operation within the window.
pub async fn undo(
    State(app): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Value>, AppError> {
    let undo = app.undo.clone();
    let reversed = tokio::task::spawn_blocking(move || undo.undo(&hash))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    if !reversed {
        return Err(AppError::not_found("operation not found in undo window"));
    }
    Ok(Json(json!({ "success": true })))
}
