use crate::types::{Issue, IssueState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Scoring constants
// ---------------------------------------------------------------------------

/// Label that removes an issue from candidacy entirely.
pub const BLOCKED_LABEL: &str = "blocked";

/// Priority label weights. The highest matched weight wins.
pub const PRIORITY_WEIGHTS: &[(&str, u32)] = &[
    ("priority-critical", 4),
    ("priority-high", 3),
    ("priority-medium", 2),
    ("priority-low", 1),
];

/// Multiplier applied to the priority weight so that priority dominates the
/// age penalty. Assumption: ages stay two orders of magnitude below this
/// scale (an issue would have to be open ~100+ days to claw back one
/// priority tier). The uncapped subtraction is intentional.
pub const PRIORITY_SCALE: f64 = 100.0;

// ---------------------------------------------------------------------------
// ScoreBreakdown
// ---------------------------------------------------------------------------

/// Per-factor contributions for one scoring decision. Returned alongside the
/// score for explainability, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreBreakdown {
    pub factors: BTreeMap<String, f64>,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// RankingEngine
// ---------------------------------------------------------------------------

/// Pure scoring function over issue metadata. Holds no state and performs no
/// I/O; assignee/team filtering belongs to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine;

impl RankingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score an issue. Blocked, closed, or pinned-out issues score negative
    /// infinity — a hard veto, not a penalty.
    pub fn score(&self, issue: &Issue, pinned: bool, now: DateTime<Utc>) -> f64 {
        self.score_explained(issue, pinned, now).0
    }

    /// Score with the per-factor breakdown. Reproducible from the same
    /// inputs: `now` is passed in rather than read from the clock.
    pub fn score_explained(
        &self,
        issue: &Issue,
        pinned: bool,
        now: DateTime<Utc>,
    ) -> (f64, ScoreBreakdown) {
        if issue.has_label(BLOCKED_LABEL) || issue.state == IssueState::Closed || pinned {
            return (f64::NEG_INFINITY, ScoreBreakdown::default());
        }

        let priority = issue
            .labels
            .iter()
            .filter_map(|label| {
                PRIORITY_WEIGHTS
                    .iter()
                    .find(|(name, _)| name == label)
                    .map(|(_, w)| *w)
            })
            .max()
            .unwrap_or(0);

        let age_days = issue.age_days(now);
        let total = f64::from(priority) * PRIORITY_SCALE - age_days as f64;

        let mut factors = BTreeMap::new();
        factors.insert("priority".to_string(), f64::from(priority));
        factors.insert("age_penalty".to_string(), age_days as f64);

        (total, ScoreBreakdown { factors, total })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
