use crate::audit::AuditLogger;
use crate::error::Result;
use crate::github::IssueStore;
use crate::hierarchy::SyncScheduler;
use crate::paths;
use crate::pinned::PinnedItemsStore;
use crate::ranking::{RankingEngine, ScoreBreakdown};
use crate::types::{Issue, IssueState};
use chrono::Utc;
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// TaskFilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Exact login match against the primary assignee or any co-assignee.
    pub assignee: Option<String>,
    /// Case-insensitive `team:<name>` label match.
    pub team: Option<String>,
}

/// A scored candidate, in ranked order.
#[derive(Debug, Clone)]
pub struct RankedIssue {
    pub issue: Issue,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

// ---------------------------------------------------------------------------
// TaskManager
// ---------------------------------------------------------------------------

/// Orchestrates the ranking engine, pinned store, and issue store to answer
/// "what's next" and to apply task updates.
pub struct TaskManager {
    store: Arc<dyn IssueStore>,
    ranking: RankingEngine,
    pinned: PinnedItemsStore,
    project: String,
    audit: Option<Arc<AuditLogger>>,
    scheduler: Option<Arc<SyncScheduler>>,
}

impl TaskManager {
    pub fn new(
        store: Arc<dyn IssueStore>,
        pinned: PinnedItemsStore,
        project: impl Into<String>,
    ) -> Result<Self> {
        let project = project.into();
        paths::validate_project_key(&project)?;
        Ok(Self {
            store,
            ranking: RankingEngine::new(),
            pinned,
            project,
            audit: None,
            scheduler: None,
        })
    }

    pub fn with_audit(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit = Some(logger);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<SyncScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    /// Fetch open issues once, filter, score, and sort descending. The sort
    /// is stable, so equal scores keep their discovery order — there is no
    /// secondary key.
    fn ranked(&self, filter: &TaskFilter, pinned_only: bool) -> Result<Vec<RankedIssue>> {
        let issues = self.store.list_issues(IssueState::Open)?;
        let pinned = self.pinned.pinned(&self.project);
        let now = Utc::now();

        let mut candidates = Vec::new();
        for issue in issues {
            if let Some(login) = &filter.assignee {
                if !issue.is_assigned_to(login) {
                    continue;
                }
            }
            if let Some(team) = &filter.team {
                if !issue.has_team_label(team) {
                    continue;
                }
            }
            let is_pinned = pinned.contains(&issue.number);
            if pinned_only && !is_pinned {
                continue;
            }
            // In the pinned-only view pins are the selection, not a veto;
            // everywhere else a pinned issue is excluded from candidacy.
            let veto_pin = is_pinned && !pinned_only;
            let (score, breakdown) = self.ranking.score_explained(&issue, veto_pin, now);
            if score == f64::NEG_INFINITY {
                continue;
            }
            candidates.push(RankedIssue {
                issue,
                score,
                breakdown,
            });
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(candidates)
    }

    /// Highest scoring unblocked issue, or None when nothing qualifies.
    pub fn get_next_task(&self, filter: &TaskFilter) -> Result<Option<Issue>> {
        Ok(self
            .ranked(filter, false)?
            .into_iter()
            .next()
            .map(|r| r.issue))
    }

    /// Like [`get_next_task`](Self::get_next_task) but with the per-factor
    /// score breakdown for the winning issue.
    pub fn explain_next_task(&self, filter: &TaskFilter) -> Result<Option<(Issue, ScoreBreakdown)>> {
        Ok(self
            .ranked(filter, false)?
            .into_iter()
            .next()
            .map(|r| (r.issue, r.breakdown)))
    }

    /// Open tasks in ranked order, truncated to `limit`. With `pinned_only`,
    /// restrict to this project's pinned issues instead of excluding them.
    pub fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: usize,
        pinned_only: bool,
    ) -> Result<Vec<Issue>> {
        Ok(self
            .ranked(filter, pinned_only)?
            .into_iter()
            .take(limit)
            .map(|r| r.issue)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Compose up to three independent mutations: status label, closure, and
    /// a note. Each is attempted even if an earlier one fails; the result is
    /// the logical AND of everything attempted. Partial failure is reported,
    /// not retried.
    pub fn update_task(
        &self,
        number: u64,
        status: Option<&str>,
        done: bool,
        notes: Option<&str>,
    ) -> Result<bool> {
        let mut success = true;

        if let Some(status) = status {
            let add = vec![status.to_string()];
            let applied = self.attempt(self.store.update_issue_labels(number, &add, &[]));
            if applied {
                self.record(
                    "update_labels",
                    json!({ "issue": number, "add_labels": add, "remove_labels": null }),
                );
            }
            success &= applied;
        }

        if done {
            // Record the pre-close state so the mutation can be reversed.
            let previous = self
                .store
                .get_issue(number)
                .ok()
                .flatten()
                .map(|i| i.state.as_str());
            let applied = self.attempt(self.store.update_issue_state(number, IssueState::Closed));
            if applied {
                self.record(
                    "update_state",
                    json!({ "issue": number, "state": "closed", "previous": previous }),
                );
            }
            success &= applied;
            self.rollover_subtasks(number);
            if let Some(scheduler) = &self.scheduler {
                scheduler.trigger();
            }
        }

        if let Some(notes) = notes {
            let applied = self.attempt(self.store.add_comment(number, notes));
            if applied {
                self.record("add_comment", json!({ "issue": number, "comment": notes }));
            }
            success &= applied;
        }

        Ok(success)
    }

    /// Extension point invoked when a task is closed.
    // TODO: roll incomplete checklist items over into follow-up issues
    pub fn rollover_subtasks(&self, number: u64) -> bool {
        tracing::debug!(issue = number, "subtask rollover hook invoked");
        true
    }

    // -----------------------------------------------------------------------
    // Pinning
    // -----------------------------------------------------------------------

    pub fn pin_task(&self, number: u64) -> Result<()> {
        self.pinned.pin(&self.project, number)
    }

    pub fn unpin_task(&self, number: u64) -> Result<bool> {
        self.pinned.unpin(&self.project, number)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Steady-state updates report transport failures as false rather than
    /// raising; the boundary already surfaced the detail.
    fn attempt(&self, result: Result<bool>) -> bool {
        match result {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!("mutation failed: {e}");
                false
            }
        }
    }

    /// An audit entry is appended only after the mutation reported success.
    fn record(&self, operation: &str, details: serde_json::Value) {
        if let Some(logger) = &self.audit {
            if let Err(e) = logger.log(operation, details) {
                tracing::warn!("audit log failed: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
