use crate::routes::webhook::OverrideStore;
use autonomy_core::audit::AuditLogger;
use autonomy_core::backlog::BacklogDoctor;
use autonomy_core::config::WorkflowConfig;
use autonomy_core::hierarchy::SyncScheduler;
use autonomy_core::rate_limit::RateLimiter;
use autonomy_core::tasks::TaskManager;
use autonomy_core::undo::UndoManager;
use std::sync::Arc;

/// Shared application state passed to all route handlers. The host (CLI or
/// embedding process) wires the components and hands them over.
#[derive(Clone)]
pub struct AppState {
    pub config: WorkflowConfig,
    pub tasks: Arc<TaskManager>,
    pub doctor: Arc<BacklogDoctor>,
    pub audit: Arc<AuditLogger>,
    pub undo: Arc<UndoManager>,
    pub scheduler: Arc<SyncScheduler>,
    pub limiter: Arc<RateLimiter>,
    pub overrides: Arc<OverrideStore>,
    /// Empty secret disables signature verification.
    pub webhook_secret: String,
}
