use crate::audit::AuditLogger;
use crate::error::Result;
use crate::github::IssueStore;
use crate::types::{Issue, IssueState};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Parent declarations
// ---------------------------------------------------------------------------

/// Label added to issues whose declared parent cannot be resolved.
pub const ORPHAN_LABEL: &str = "orphaned";

/// Label convention for declaring a parent: `parent:42`.
pub const PARENT_LABEL_PREFIX: &str = "parent:";

static PARENT_RE: OnceLock<Regex> = OnceLock::new();

fn parent_re() -> &'static Regex {
    // Matches body lines like "**Epic:** #42", "Epic: 42", "Parent: #42".
    PARENT_RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:\*\*)?(?:epic|parent)(?:\*\*)?\s*:\s*#?(\d+)\s*$").unwrap()
    })
}

/// Extract the declared parent issue number, if any. The label convention
/// wins over the body convention.
pub fn parent_reference(issue: &Issue) -> Option<u64> {
    for label in &issue.labels {
        if let Some(rest) = label.strip_prefix(PARENT_LABEL_PREFIX) {
            if let Ok(number) = rest.trim().parse() {
                return Some(number);
            }
        }
    }
    parent_re()
        .captures(&issue.body)
        .and_then(|c| c[1].parse().ok())
}

// ---------------------------------------------------------------------------
// Derived tree
// ---------------------------------------------------------------------------

/// One node of the derived hierarchy. Rebuilt from scratch on every sync
/// pass; held in memory only for the duration of the run.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    pub number: u64,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
    pub orphan: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HierarchySummary {
    /// Issues attached to a resolved parent during this pass.
    pub created: Vec<u64>,
    /// Issues flagged (or already flagged) as orphans.
    pub orphans: Vec<u64>,
}

// ---------------------------------------------------------------------------
// HierarchyManager
// ---------------------------------------------------------------------------

pub struct HierarchyManager {
    store: Arc<dyn IssueStore>,
    orphan_grace_days: i64,
    audit: Option<Arc<AuditLogger>>,
}

impl HierarchyManager {
    pub fn new(store: Arc<dyn IssueStore>, orphan_grace_days: i64) -> Self {
        Self {
            store,
            orphan_grace_days,
            audit: None,
        }
    }

    pub fn with_audit(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit = Some(logger);
        self
    }

    /// Rebuild the derived tree from all open issues, flag orphans past the
    /// grace period, and relabel them for visibility. O(issues) per run;
    /// acceptable because runs are cooldown-throttled by [`SyncScheduler`].
    pub fn maintain_hierarchy(&self) -> Result<HierarchySummary> {
        let issues = self.store.list_issues(IssueState::Open)?;
        let now = Utc::now();
        let (tree, summary) = self.build_tree(&issues, now)?;

        for number in &summary.orphans {
            let already_flagged = issues
                .iter()
                .find(|i| i.number == *number)
                .map(|i| i.has_label(ORPHAN_LABEL))
                .unwrap_or(false);
            if already_flagged {
                continue;
            }
            match self
                .store
                .update_issue_labels(*number, &[ORPHAN_LABEL.to_string()], &[])
            {
                Ok(_) => {}
                Err(e) => tracing::warn!(issue = number, "orphan relabel failed: {e}"),
            }
        }

        if let Some(logger) = &self.audit {
            let details = json!({
                "created": summary.created,
                "orphans": summary.orphans,
                "nodes": tree.len(),
            });
            if let Err(e) = logger.log("hierarchy_sync", details) {
                tracing::warn!("failed to record hierarchy sync: {e}");
            }
        }

        Ok(summary)
    }

    fn build_tree(
        &self,
        issues: &[Issue],
        now: DateTime<Utc>,
    ) -> Result<(BTreeMap<u64, HierarchyNode>, HierarchySummary)> {
        let mut tree: BTreeMap<u64, HierarchyNode> = issues
            .iter()
            .map(|i| {
                (
                    i.number,
                    HierarchyNode {
                        number: i.number,
                        parent: None,
                        children: Vec::new(),
                        orphan: false,
                    },
                )
            })
            .collect();

        let mut summary = HierarchySummary::default();
        for issue in issues {
            let Some(parent) = parent_reference(issue) else {
                continue;
            };
            if let Some(node) = tree.get_mut(&issue.number) {
                node.parent = Some(parent);
            }

            // Resolve against the scanned open set first; fall back to a
            // point lookup so references to closed issues are not orphans.
            let resolved =
                tree.contains_key(&parent) || self.store.get_issue(parent)?.is_some();
            if resolved {
                if let Some(parent_node) = tree.get_mut(&parent) {
                    parent_node.children.push(issue.number);
                }
                summary.created.push(issue.number);
            } else if issue.age_days(now) >= self.orphan_grace_days {
                if let Some(node) = tree.get_mut(&issue.number) {
                    node.orphan = true;
                }
                summary.orphans.push(issue.number);
            }
        }
        Ok((tree, summary))
    }
}

// ---------------------------------------------------------------------------
// SyncScheduler
// ---------------------------------------------------------------------------

type SyncJob = Arc<dyn Fn() -> Result<HierarchySummary> + Send + Sync>;

/// Cooldown-gated, fire-and-forget dispatcher for hierarchy resyncs.
///
/// A trigger arriving before the cooldown has elapsed is dropped, not
/// queued — a missed resync is traded for avoiding synchronization storms
/// under bursty edits; a later trigger catches up. Errors from the
/// background run are logged and never reach the triggering caller.
pub struct SyncScheduler {
    cooldown: Duration,
    last_trigger: Mutex<Option<Instant>>,
    job: SyncJob,
}

impl SyncScheduler {
    pub fn new(cooldown: Duration, job: SyncJob) -> Self {
        Self {
            cooldown,
            last_trigger: Mutex::new(None),
            job,
        }
    }

    pub fn for_manager(cooldown: Duration, manager: Arc<HierarchyManager>) -> Self {
        Self::new(cooldown, Arc::new(move || manager.maintain_hierarchy()))
    }

    /// Check-then-set under a single lock; the cooldown is measured from the
    /// last accepted trigger.
    fn try_acquire(&self) -> bool {
        let mut last = self.last_trigger.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(t) if t.elapsed() < self.cooldown => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    /// Dispatch a background resync unless still cooling down. Returns
    /// whether a run was started.
    pub fn trigger(&self) -> bool {
        if !self.try_acquire() {
            return false;
        }
        let job = Arc::clone(&self.job);
        std::thread::spawn(move || {
            if let Err(e) = job() {
                tracing::warn!("hierarchy sync failed: {e}");
            }
        });
        true
    }

    /// Run the sync on the calling thread, still honoring the cooldown.
    /// Used by the explicit `sync` command where the result is wanted.
    pub fn run_now(&self) -> Result<Option<HierarchySummary>> {
        if !self.try_acquire() {
            return Ok(None);
        }
        (self.job)().map(Some)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StoreCall, TestStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn issue(number: u64, body: &str, labels: &[&str], age_days: i64) -> Issue {
        Issue {
            number,
            title: format!("issue {number}"),
            body: body.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            assignee: None,
            assignees: Vec::new(),
            state: IssueState::Open,
            created_at: Utc::now() - chrono::Duration::days(age_days),
            updated_at: None,
        }
    }

    #[test]
    fn parent_reference_from_body() {
        let i = issue(2, "Intro\n\n**Epic:** #12\n", &[], 0);
        assert_eq!(parent_reference(&i), Some(12));
        let i = issue(2, "Parent: 7", &[], 0);
        assert_eq!(parent_reference(&i), Some(7));
        let i = issue(2, "no declarations here", &[], 0);
        assert_eq!(parent_reference(&i), None);
    }

    #[test]
    fn parent_label_wins_over_body() {
        let i = issue(2, "**Epic:** #12", &["parent:3"], 0);
        assert_eq!(parent_reference(&i), Some(3));
    }

    #[test]
    fn resolved_parent_builds_children() {
        let store = Arc::new(TestStore::with_issues(vec![
            issue(1, "", &["epic"], 10),
            issue(2, "**Epic:** #1", &[], 5),
            issue(3, "**Epic:** #1", &[], 5),
        ]));
        let mgr = HierarchyManager::new(store.clone(), 2);
        let summary = mgr.maintain_hierarchy().unwrap();
        assert_eq!(summary.created, vec![2, 3]);
        assert!(summary.orphans.is_empty());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn dangling_parent_past_grace_is_orphaned_and_relabeled() {
        let store = Arc::new(TestStore::with_issues(vec![issue(
            4,
            "**Epic:** #99",
            &[],
            7,
        )]));
        let mgr = HierarchyManager::new(store.clone(), 2);
        let summary = mgr.maintain_hierarchy().unwrap();
        assert_eq!(summary.orphans, vec![4]);
        assert_eq!(
            store.calls(),
            vec![StoreCall::Labels {
                number: 4,
                add: vec![ORPHAN_LABEL.to_string()],
                remove: vec![],
            }]
        );
    }

    #[test]
    fn young_dangling_parent_is_within_grace() {
        let store = Arc::new(TestStore::with_issues(vec![issue(
            4,
            "**Epic:** #99",
            &[],
            0,
        )]));
        let mgr = HierarchyManager::new(store.clone(), 2);
        let summary = mgr.maintain_hierarchy().unwrap();
        assert!(summary.orphans.is_empty());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn already_flagged_orphan_is_not_relabeled() {
        let store = Arc::new(TestStore::with_issues(vec![issue(
            4,
            "**Epic:** #99",
            &[ORPHAN_LABEL],
            7,
        )]));
        let mgr = HierarchyManager::new(store.clone(), 2);
        let summary = mgr.maintain_hierarchy().unwrap();
        assert_eq!(summary.orphans, vec![4]);
        assert!(store.calls().is_empty());
    }

    #[test]
    fn sync_pass_is_audited() {
        let dir = tempfile::TempDir::new().unwrap();
        let logger = Arc::new(AuditLogger::new(dir.path().join("audit.log")).unwrap());
        let store = Arc::new(TestStore::with_issues(vec![issue(1, "", &[], 0)]));
        let mgr = HierarchyManager::new(store, 2).with_audit(logger.clone());
        mgr.maintain_hierarchy().unwrap();
        let entries = logger.iter_logs();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "hierarchy_sync");
    }

    #[test]
    fn scheduler_gate_drops_within_cooldown() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let scheduler = SyncScheduler::new(
            Duration::from_secs(3600),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(HierarchySummary::default())
            }),
        );

        assert!(scheduler.trigger());
        assert!(!scheduler.trigger());

        // Wait for the single background run to land.
        for _ in 0..100 {
            if count.load(Ordering::SeqCst) == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scheduler_zero_cooldown_always_fires() {
        let scheduler = SyncScheduler::new(
            Duration::from_secs(0),
            Arc::new(|| Ok(HierarchySummary::default())),
        );
        assert!(scheduler.trigger());
        assert!(scheduler.trigger());
    }

    #[test]
    fn run_now_returns_summary_and_honors_cooldown() {
        let scheduler = SyncScheduler::new(
            Duration::from_secs(3600),
            Arc::new(|| {
                Ok(HierarchySummary {
                    created: vec![2],
                    orphans: vec![],
                })
            }),
        );
        let first = scheduler.run_now().unwrap();
        assert_eq!(first.unwrap().created, vec![2]);
        assert!(scheduler.run_now().unwrap().is_none());
    }
}
