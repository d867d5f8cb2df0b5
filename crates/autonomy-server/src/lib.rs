pub mod error;
pub mod routes;
pub mod state;

pub use routes::webhook::OverrideStore;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Tasks
        .route("/api/v1/tasks/next", get(routes::tasks::next_task))
        .route("/api/v1/tasks", get(routes::tasks::list_tasks))
        .route(
            "/api/v1/tasks/{id}/update",
            post(routes::tasks::update_task),
        )
        // Backlog doctor
        .route(
            "/api/v1/backlog/doctor/run",
            post(routes::backlog::run_doctor),
        )
        // Audit
        .route("/api/v1/audit/log", get(routes::audit::get_log))
        .route("/api/v1/audit/undo/{hash}", post(routes::audit::undo))
        // Hierarchy
        .route(
            "/api/v1/hierarchy/sync",
            post(routes::hierarchy::trigger_sync),
        )
        // Webhooks
        .route("/webhook/github", post(routes::webhook::github_webhook))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on `port`.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("autonomy API listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
