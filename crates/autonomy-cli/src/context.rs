use anyhow::Context;
use autonomy_core::audit::AuditLogger;
use autonomy_core::config::WorkflowConfig;
use autonomy_core::github::{GithubClient, IssueStore};
use autonomy_core::hierarchy::{HierarchyManager, SyncScheduler};
use autonomy_core::paths;
use autonomy_core::pinned::PinnedItemsStore;
use autonomy_core::tasks::TaskManager;
use autonomy_core::undo::UndoManager;
use autonomy_core::AutonomyError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Global flags shared by every command.
pub struct GlobalArgs {
    pub root: PathBuf,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub json: bool,
}

impl GlobalArgs {
    /// `owner/repo` key for local state; does not need a token.
    pub fn project_key(&self) -> anyhow::Result<String> {
        let owner = self
            .owner
            .as_deref()
            .context("repository owner required: pass --owner or set GITHUB_OWNER")?;
        let repo = self
            .repo
            .as_deref()
            .context("repository name required: pass --repo or set GITHUB_REPO")?;
        let key = format!("{owner}/{repo}");
        paths::validate_project_key(&key)?;
        Ok(key)
    }
}

/// Fully wired core components backed by the live GitHub API.
pub struct Remote {
    pub store: Arc<GithubClient>,
    pub config: WorkflowConfig,
    pub audit: Arc<AuditLogger>,
    pub scheduler: Arc<SyncScheduler>,
}

/// Build the component graph: client -> audit logger -> hierarchy manager ->
/// cooldown scheduler, with the scheduler registered as the client's
/// post-mutation listener. Missing credentials abort here; steady-state
/// operations never raise for them again.
pub fn require_remote(args: &GlobalArgs) -> anyhow::Result<Remote> {
    let project = args.project_key()?;
    let (owner, repo) = project
        .split_once('/')
        .expect("validated project key always contains a slash");
    let token = args.token.clone().ok_or(AutonomyError::MissingToken)?;

    let config = WorkflowConfig::load_or_default(&args.root);
    let store = Arc::new(GithubClient::new(token, owner, repo)?);
    let audit = Arc::new(AuditLogger::with_git(
        paths::audit_log_path(&args.root),
        config.audit_use_git,
    )?);

    let manager = Arc::new(
        HierarchyManager::new(store.clone() as Arc<dyn IssueStore>, config.orphan_grace_days)
            .with_audit(audit.clone()),
    );
    let scheduler = Arc::new(SyncScheduler::for_manager(
        Duration::from_secs(config.sync_cooldown_secs),
        manager,
    ));

    let trigger = scheduler.clone();
    store.set_change_listener(Arc::new(move || {
        trigger.trigger();
    }));

    Ok(Remote {
        store,
        config,
        audit,
        scheduler,
    })
}

impl Remote {
    pub fn task_manager(&self, root: &Path) -> anyhow::Result<TaskManager> {
        let pinned = PinnedItemsStore::new(paths::pinned_path(root));
        let tm = TaskManager::new(self.store.clone(), pinned, self.store.project_key())?
            .with_audit(self.audit.clone())
            .with_scheduler(self.scheduler.clone());
        Ok(tm)
    }

    pub fn undo_manager(&self) -> UndoManager {
        UndoManager::new(
            self.store.clone(),
            self.audit.clone(),
            self.config.commit_window,
        )
    }
}

/// Offline audit logger over the local log file.
pub fn local_audit(args: &GlobalArgs) -> anyhow::Result<AuditLogger> {
    paths::require_initialized(&args.root)?;
    let config = WorkflowConfig::load_or_default(&args.root);
    Ok(AuditLogger::with_git(
        paths::audit_log_path(&args.root),
        config.audit_use_git,
    )?)
}
