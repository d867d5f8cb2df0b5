use crate::context::{require_remote, GlobalArgs};
use autonomy_core::backlog::BacklogDoctor;
use autonomy_core::github::IssueStore;
use autonomy_core::paths;
use autonomy_core::rate_limit::RateLimiter;
use autonomy_server::{AppState, OverrideStore};
use std::sync::Arc;
use std::time::Duration;

pub fn run(args: &GlobalArgs, port: u16) -> anyhow::Result<()> {
    let remote = require_remote(args)?;

    let state = AppState {
        config: remote.config.clone(),
        tasks: Arc::new(remote.task_manager(&args.root)?),
        doctor: Arc::new(BacklogDoctor::new(
            remote.store.clone() as Arc<dyn IssueStore>
        )),
        audit: remote.audit.clone(),
        undo: Arc::new(remote.undo_manager()),
        scheduler: remote.scheduler.clone(),
        limiter: Arc::new(RateLimiter::new(
            remote.config.webhook_max_calls,
            Duration::from_secs(remote.config.webhook_window_secs),
        )),
        overrides: Arc::new(OverrideStore::new(paths::overrides_path(&args.root))),
        webhook_secret: std::env::var("GITHUB_WEBHOOK_SECRET").unwrap_or_default(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(autonomy_server::serve(state, port))
}
