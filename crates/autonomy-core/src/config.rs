use crate::error::{AutonomyError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

/// Tunables for the workflow core, persisted at `.autonomy/config.yaml`.
/// Every field has a serde default so a partial (or absent) file never fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// How many trailing audit entries are eligible for undo (0 = unbounded).
    #[serde(default = "default_commit_window")]
    pub commit_window: usize,
    /// Minimum seconds between hierarchy resync runs.
    #[serde(default = "default_sync_cooldown")]
    pub sync_cooldown_secs: u64,
    /// Issues younger than this are not flagged as orphans even when their
    /// declared parent is unresolved.
    #[serde(default = "default_orphan_grace")]
    pub orphan_grace_days: i64,
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,
    #[serde(default = "default_checklist_limit")]
    pub checklist_limit: usize,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
    #[serde(default = "default_webhook_max_calls")]
    pub webhook_max_calls: usize,
    #[serde(default = "default_webhook_window")]
    pub webhook_window_secs: u64,
    /// Commit each audit append to a git repo next to the log file.
    #[serde(default)]
    pub audit_use_git: bool,
}

fn default_commit_window() -> usize {
    5
}

fn default_sync_cooldown() -> u64 {
    60
}

fn default_orphan_grace() -> i64 {
    2
}

fn default_stale_days() -> i64 {
    14
}

fn default_checklist_limit() -> usize {
    10
}

fn default_duplicate_threshold() -> f64 {
    0.9
}

fn default_webhook_max_calls() -> usize {
    30
}

fn default_webhook_window() -> u64 {
    60
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            commit_window: default_commit_window(),
            sync_cooldown_secs: default_sync_cooldown(),
            orphan_grace_days: default_orphan_grace(),
            stale_days: default_stale_days(),
            checklist_limit: default_checklist_limit(),
            duplicate_threshold: default_duplicate_threshold(),
            webhook_max_calls: default_webhook_max_calls(),
            webhook_window_secs: default_webhook_window(),
            audit_use_git: false,
        }
    }
}

impl WorkflowConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(AutonomyError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: WorkflowConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Steady-state loader: a missing or unreadable config is not fatal.
    pub fn load_or_default(root: &Path) -> Self {
        match Self::load(root) {
            Ok(cfg) => cfg,
            Err(AutonomyError::NotInitialized) => Self::default(),
            Err(e) => {
                tracing::warn!("config unreadable, using defaults: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.commit_window, 5);
        assert_eq!(cfg.sync_cooldown_secs, 60);
        assert_eq!(cfg.orphan_grace_days, 2);
        assert_eq!(cfg.stale_days, 14);
        assert_eq!(cfg.checklist_limit, 10);
        assert!(!cfg.audit_use_git);
    }

    #[test]
    fn roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = WorkflowConfig::default();
        cfg.commit_window = 9;
        cfg.audit_use_git = true;
        cfg.save(dir.path()).unwrap();

        let loaded = WorkflowConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.commit_window, 9);
        assert!(loaded.audit_use_git);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: WorkflowConfig = serde_yaml::from_str("commit_window: 3\n").unwrap();
        assert_eq!(cfg.commit_window, 3);
        assert_eq!(cfg.sync_cooldown_secs, 60);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            WorkflowConfig::load(dir.path()),
            Err(AutonomyError::NotInitialized)
        ));
    }

    #[test]
    fn load_or_default_never_fails() {
        let dir = TempDir::new().unwrap();
        let cfg = WorkflowConfig::load_or_default(dir.path());
        assert_eq!(cfg.commit_window, 5);

        // Corrupt file also falls back to defaults.
        std::fs::create_dir_all(paths::autonomy_dir(dir.path())).unwrap();
        std::fs::write(paths::config_path(dir.path()), ": not yaml [").unwrap();
        let cfg = WorkflowConfig::load_or_default(dir.path());
        assert_eq!(cfg.stale_days, 14);
    }
}
