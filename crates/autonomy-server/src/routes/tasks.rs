use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;
use autonomy_core::tasks::TaskFilter;
use autonomy_core::AutonomyError;

#[derive(Deserialize)]
pub struct TaskQuery {
    pub assignee: Option<String>,
    pub team: Option<String>,
    #[serde(default)]
    pub explain: bool,
    pub limit: Option<usize>,
    #[serde(default)]
    pub pinned: bool,
}

impl TaskQuery {
    fn filter(&self) -> TaskFilter {
        TaskFilter {
            assignee: self.assignee.clone(),
            team: self.team.clone(),
        }
    }
}

/// GET /api/v1/tasks/next — highest scoring unblocked task.
pub async fn next_task(
    State(app): State<AppState>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<Value>, AppError> {
    let tasks = app.tasks.clone();
    let result = tokio::task::spawn_blocking(move || {
        let filter = q.filter();
        if q.explain {
            Ok::<_, AutonomyError>(
                tasks
                    .explain_next_task(&filter)?
                    .map(|(issue, breakdown)| json!({ "issue": issue, "breakdown": breakdown })),
            )
        } else {
            Ok(tasks
                .get_next_task(&filter)?
                .map(|issue| json!({ "issue": issue })))
        }
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    result.map(Json).ok_or_else(|| AppError::not_found("no tasks found"))
}

/// GET /api/v1/tasks — ranked open tasks.
pub async fn list_tasks(
    State(app): State<AppState>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<Value>, AppError> {
    let tasks = app.tasks.clone();
    let result = tokio::task::spawn_blocking(move || {
        let filter = q.filter();
        let limit = q.limit.unwrap_or(10);
        tasks.list_tasks(&filter, limit, q.pinned)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(json!(result)))
}

#[derive(Deserialize)]
pub struct UpdateTaskBody {
    pub status: Option<String>,
    #[serde(default)]
    pub done: bool,
    pub notes: Option<String>,
}

/// POST /api/v1/tasks/{id}/update — compose status/closure/note mutations.
pub async fn update_task(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<UpdateTaskBody>,
) -> Result<Json<Value>, AppError> {
    let tasks = app.tasks.clone();
    let success = tokio::task::spawn_blocking(move || {
        tasks.update_task(id, body.status.as_deref(), body.done, body.notes.as_deref())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    if !success {
        return Err(AppError(anyhow::anyhow!("failed to update task #{id}")));
    }
    Ok(Json(json!({ "success": true })))
}
