use crate::error::Result;
use crate::hash;
use crate::io;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// One immutable line of the append-only audit log.
///
/// `diff_hash` covers only `details` (key order independent), so identical
/// mutations performed at different times share it — the stable idempotency
/// key for external consumers. `hash` covers the full entry including the
/// timestamp and `diff_hash`, and uniquely addresses this entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub operation: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
    pub diff_hash: String,
    pub hash: String,
}

// ---------------------------------------------------------------------------
// AuditLogger
// ---------------------------------------------------------------------------

/// Append-only JSON-lines audit log. Sole writer of its log file; the only
/// permitted mutation is appending one line.
pub struct AuditLogger {
    log_path: PathBuf,
    use_git: bool,
}

impl AuditLogger {
    pub fn new(log_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_git(log_path, false)
    }

    /// With `use_git`, each append also commits the log file to a repository
    /// in the log directory for tamper evidence. Commit failures never lose
    /// the in-file entry.
    pub fn with_git(log_path: impl Into<PathBuf>, use_git: bool) -> Result<Self> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            io::ensure_dir(parent)?;
        }
        io::write_if_missing(&log_path, b"")?;
        let logger = Self { log_path, use_git };
        if use_git {
            logger.ensure_repo();
        }
        Ok(logger)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn uses_git(&self) -> bool {
        self.use_git
    }

    fn repo_dir(&self) -> &Path {
        self.log_path.parent().unwrap_or(Path::new("."))
    }

    /// Append an operation and return the unique entry hash.
    ///
    /// Two-stage digest, in this order: `diff_hash` over `details` first,
    /// then `hash` over the full payload with `diff_hash` attached. The
    /// entry hash therefore depends on the diff hash, never the reverse.
    pub fn log(&self, operation: &str, details: Value) -> Result<String> {
        let diff_hash = hash::hash_value(&details);
        let mut entry = AuditEntry {
            operation: operation.to_string(),
            details,
            timestamp: Utc::now(),
            diff_hash,
            hash: String::new(),
        };

        let mut payload = serde_json::to_value(&entry)?;
        if let Some(map) = payload.as_object_mut() {
            map.remove("hash");
        }
        entry.hash = hash::hash_value(&payload);

        io::append_jsonl(&self.log_path, &entry)?;
        if self.use_git {
            self.commit_entry(&entry);
        }
        Ok(entry.hash)
    }

    /// Read all entries, oldest first. Re-reads the file on every call so
    /// concurrent appends are always visible; unparsable lines are skipped
    /// so one corrupt line never blocks replay of the rest.
    pub fn iter_logs(&self) -> Vec<AuditEntry> {
        let Ok(content) = std::fs::read_to_string(&self.log_path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Trailing-window aggregates
    // -----------------------------------------------------------------------

    /// Count entries for `operation` in the last `days` days.
    pub fn count_operations(&self, operation: &str, days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(days);
        self.iter_logs()
            .iter()
            .filter(|e| e.operation == operation && e.timestamp >= cutoff)
            .count()
    }

    pub fn count_undo_operations(&self, days: i64) -> usize {
        self.count_operations("undo_operation", days)
    }

    /// Count external mutations (label, state, and comment writes) in the
    /// last `days` days.
    pub fn count_mutations(&self, days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(days);
        self.iter_logs()
            .iter()
            .filter(|e| {
                matches!(
                    e.operation.as_str(),
                    "update_labels" | "update_state" | "add_comment"
                ) && e.timestamp >= cutoff
            })
            .count()
    }

    // -----------------------------------------------------------------------
    // Git durability tier (best-effort)
    // -----------------------------------------------------------------------

    fn ensure_repo(&self) {
        let dir = self.repo_dir();
        let initialized = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if initialized {
            return;
        }
        for args in [
            &["init"][..],
            &["config", "user.email", "audit@autonomy.local"],
            &["config", "user.name", "autonomy-audit"],
        ] {
            if let Err(e) = Command::new("git").args(args).current_dir(dir).output() {
                tracing::warn!("audit git init failed: {e}");
                return;
            }
        }
    }

    fn commit_entry(&self, entry: &AuditEntry) {
        let dir = self.repo_dir();
        let file_name = self
            .log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audit.log".to_string());
        let message = format!("audit: {} {}", entry.hash, entry.operation);
        let committed = Command::new("git")
            .args(["add", file_name.as_str()])
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
            && Command::new("git")
                .args(["commit", "-m", message.as_str()])
                .current_dir(dir)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false);
        if !committed {
            tracing::warn!(hash = %entry.hash, "audit git commit failed; entry kept in file");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn logger(dir: &TempDir) -> AuditLogger {
        AuditLogger::new(dir.path().join("audit.log")).unwrap()
    }

    #[test]
    fn log_then_iter_yields_entry() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        let details = json!({"issue": 2, "add_labels": ["a"], "remove_labels": null});
        let h = log.log("update_labels", details.clone()).unwrap();

        let entries = log.iter_logs();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "update_labels");
        assert_eq!(entries[0].hash, h);
        assert_eq!(entries[0].diff_hash, crate::hash::hash_value(&details));
    }

    #[test]
    fn diff_hash_is_key_order_independent() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        let a: Value = serde_json::from_str(r#"{"issue":2,"add_labels":["a"]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"add_labels":["a"],"issue":2}"#).unwrap();
        log.log("update_labels", a).unwrap();
        log.log("update_labels", b).unwrap();

        let entries = log.iter_logs();
        assert_eq!(entries[0].diff_hash, entries[1].diff_hash);
    }

    #[test]
    fn same_details_twice_share_diff_hash_not_hash() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        let details = json!({"issue": 5, "state": "closed"});
        let h1 = log.log("update_state", details.clone()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let h2 = log.log("update_state", details).unwrap();

        let entries = log.iter_logs();
        assert_eq!(entries[0].diff_hash, entries[1].diff_hash);
        assert_ne!(h1, h2);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        log.log("update_state", json!({"issue": 1})).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.log_path())
            .and_then(|mut f| {
                use std::io::Write;
                writeln!(f, "{{not json")
            })
            .unwrap();
        log.log("update_state", json!({"issue": 2})).unwrap();

        let entries = log.iter_logs();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn iter_logs_sees_concurrent_growth() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        assert!(log.iter_logs().is_empty());
        log.log("add_comment", json!({"issue": 1, "comment": "x"}))
            .unwrap();
        assert_eq!(log.iter_logs().len(), 1);
    }

    #[test]
    fn count_windows() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        log.log("update_labels", json!({"issue": 1, "add_labels": ["x"]}))
            .unwrap();
        log.log("undo_operation", json!({"target": "abc"})).unwrap();

        assert_eq!(log.count_mutations(7), 1);
        assert_eq!(log.count_undo_operations(7), 1);
        assert_eq!(log.count_operations("shadow_pr", 7), 0);
    }

    #[test]
    fn git_tier_commits_entry() {
        if Command::new("git").arg("--version").output().is_err() {
            return; // environment has no git; the tier is best-effort anyway
        }
        let dir = TempDir::new().unwrap();
        let log = AuditLogger::with_git(dir.path().join("audit.log"), true).unwrap();
        assert!(dir.path().join(".git").exists());

        let h = log.log("update_state", json!({"issue": 3})).unwrap();
        let out = Command::new("git")
            .args(["log", "-1", "--pretty=%s"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        let subject = String::from_utf8_lossy(&out.stdout);
        assert!(subject.contains(&h));
    }
}
