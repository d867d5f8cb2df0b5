use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;
use autonomy_core::backlog::DoctorOptions;

#[derive(Deserialize)]
pub struct DoctorQuery {
    pub stale_days: Option<i64>,
    pub checklist_limit: Option<usize>,
}

/// POST /api/v1/backlog/doctor/run — run hygiene checks and apply labels.
pub async fn run_doctor(
    State(app): State<AppState>,
    Query(q): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor = app.doctor.clone();
    let opts = DoctorOptions {
        stale_days: q.stale_days.unwrap_or(app.config.stale_days),
        checklist_limit: q.checklist_limit.unwrap_or(app.config.checklist_limit),
        duplicate_threshold: app.config.duplicate_threshold,
        ..DoctorOptions::default()
    };

    let report = tokio::task::spawn_blocking(move || doctor.run(&opts))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(json!(report)))
}
