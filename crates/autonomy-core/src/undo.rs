use crate::audit::{AuditEntry, AuditLogger};
use crate::error::Result;
use crate::github::IssueStore;
use crate::hash;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// UndoManager
// ---------------------------------------------------------------------------

/// Reverses mutations previously recorded by [`AuditLogger`], bounded by a
/// trailing commit window. Holds no state of its own.
///
/// Reversal inverts exactly the recorded delta; it never recomputes from
/// current external state, which may have drifted since the original
/// mutation.
pub struct UndoManager {
    store: Arc<dyn IssueStore>,
    logger: Arc<AuditLogger>,
    commit_window: usize,
}

impl UndoManager {
    /// `commit_window` = 0 means the entire log is eligible.
    pub fn new(store: Arc<dyn IssueStore>, logger: Arc<AuditLogger>, commit_window: usize) -> Self {
        Self {
            store,
            logger,
            commit_window,
        }
    }

    /// The trailing entries currently eligible for undo, oldest first.
    pub fn window(&self) -> Vec<AuditEntry> {
        let mut logs = self.logger.iter_logs();
        if self.commit_window > 0 && logs.len() > self.commit_window {
            logs = logs.split_off(logs.len() - self.commit_window);
        }
        logs
    }

    /// Undo the entry matching `target` (entry hash or diff hash). Searched
    /// most-recent-first so a replayed diff hash resolves to its latest
    /// occurrence. Returns false when no eligible entry matches or the
    /// operation kind is not reversible.
    pub fn undo(&self, target: &str) -> Result<bool> {
        for entry in self.window().iter().rev() {
            if entry.hash == target || entry.diff_hash == target {
                return self.reverse(entry);
            }
        }
        Ok(false)
    }

    /// Undo the most recent eligible entry; returns its hash on success.
    pub fn undo_last(&self) -> Result<Option<String>> {
        let window = self.window();
        let Some(last) = window.last() else {
            return Ok(None);
        };
        if self.reverse(last)? {
            Ok(Some(last.hash.clone()))
        } else {
            Ok(None)
        }
    }

    fn reverse(&self, entry: &AuditEntry) -> Result<bool> {
        let details = &entry.details;
        let Some(issue) = details.get("issue").and_then(Value::as_u64) else {
            return Ok(false);
        };

        let reversed = match entry.operation.as_str() {
            // What was added is now removed, and vice versa.
            "update_labels" => {
                let add = string_list(details, "add_labels");
                let remove = string_list(details, "remove_labels");
                self.store.update_issue_labels(issue, &remove, &add)?
            }
            // Restore the recorded previous state; without one there is
            // nothing to restore.
            "update_state" => match details.get("previous").and_then(Value::as_str) {
                Some(previous) => {
                    let state = previous.parse()?;
                    self.store.update_issue_state(issue, state)?
                }
                None => false,
            },
            // Comments cannot be deleted through the API in general; the
            // compensating action is a superseding comment.
            "add_comment" => match details.get("comment").and_then(Value::as_str) {
                Some(comment) => {
                    let note = format!("Undo: previous comment superseded -> {comment}");
                    self.store.add_comment(issue, &note)?
                }
                None => false,
            },
            _ => false,
        };

        if reversed {
            self.logger.log(
                "undo_operation",
                json!({
                    "target": entry.hash,
                    "commit_window": self.commit_window,
                }),
            )?;
        }
        Ok(reversed)
    }

    // -----------------------------------------------------------------------
    // Shadow-branch mode
    // -----------------------------------------------------------------------

    /// Stage a reversal change set on a deterministically named branch and
    /// open a review request instead of mutating directly. Intended for
    /// higher-risk batch reversals; mutually exclusive per invocation with
    /// direct reversal.
    pub fn create_shadow_branch_pr(
        &self,
        entries: &[AuditEntry],
        base_branch: &str,
    ) -> Result<Option<u64>> {
        let payload = serde_json::to_value(entries)?;
        let diff_hash = hash::hash_value(&payload);
        let branch = format!("shadow-{diff_hash}");

        if self.logger.uses_git() {
            let repo = self
                .logger
                .log_path()
                .parent()
                .unwrap_or(Path::new("."))
                .to_path_buf();
            if !stage_shadow_branch(&repo, &branch, &diff_hash, &payload) {
                return Ok(None);
            }
        }

        let title = format!("Undo operations {diff_hash}");
        let body = format!("Automated reversal change set\n\nDiff hash: `{diff_hash}`");
        let pr = self
            .store
            .create_pull_request(&title, &body, &branch, base_branch)?;

        if let Some(number) = pr {
            self.logger.log(
                "shadow_pr",
                json!({ "hash": diff_hash, "pr": number, "branch": branch }),
            )?;
        }
        Ok(pr)
    }

    /// Post `diff_hash` as a visible comment on a pull request so reviewers
    /// can cross-reference audit entries without access to the log file.
    pub fn embed_diff_hash(&self, pr_number: u64, diff_hash: &str) -> Result<bool> {
        let comment = format!("diff-hash: `{diff_hash}`");
        let posted = self.store.add_comment(pr_number, &comment)?;
        if posted {
            self.logger.log(
                "embed_diff_hash",
                json!({ "pr": pr_number, "diff_hash": diff_hash }),
            )?;
        }
        Ok(posted)
    }
}

/// Null or missing keys decode as the empty list, matching how mutations
/// record "no labels on this side".
fn string_list(details: &Value, key: &str) -> Vec<String> {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Commit the change set on its own branch, restoring the original branch
/// afterwards. Best-effort: any git failure abandons shadow mode.
fn stage_shadow_branch(repo: &Path, branch: &str, diff_hash: &str, payload: &Value) -> bool {
    let run = |args: &[&str]| -> Option<String> {
        let out = Command::new("git").args(args).current_dir(repo).output().ok()?;
        if !out.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
    };

    let Some(current) = run(&["rev-parse", "--abbrev-ref", "HEAD"]) else {
        tracing::warn!("shadow branch staging failed: cannot resolve HEAD");
        return false;
    };
    let file_name = format!("undo_{diff_hash}.json");
    let staged = run(&["checkout", "-b", branch]).is_some()
        && serde_json::to_vec_pretty(payload)
            .ok()
            .and_then(|data| std::fs::write(repo.join(&file_name), data).ok())
            .is_some()
        && run(&["add", &file_name]).is_some()
        && run(&["commit", "-m", &format!("shadow {diff_hash}")]).is_some();
    let restored = run(&["checkout", &current]).is_some();
    if !staged || !restored {
        tracing::warn!(branch, "shadow branch staging failed");
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
