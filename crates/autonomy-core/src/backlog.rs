use crate::error::Result;
use crate::github::IssueStore;
use crate::types::{Issue, IssueState};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

pub const STALE_LABEL: &str = "stale";
pub const DUPLICATE_LABEL: &str = "duplicate-candidate";
pub const OVERSIZED_LABEL: &str = "oversized";

// ---------------------------------------------------------------------------
// Options / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DoctorOptions {
    pub stale_days: i64,
    pub checklist_limit: usize,
    pub duplicate_threshold: f64,
    pub check_stale: bool,
    pub check_duplicates: bool,
    pub check_oversized: bool,
}

impl Default for DoctorOptions {
    fn default() -> Self {
        Self {
            stale_days: 14,
            checklist_limit: 10,
            duplicate_threshold: 0.9,
            check_stale: true,
            check_duplicates: true,
            check_oversized: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub stale: Vec<u64>,
    pub duplicates: Vec<(u64, u64)>,
    pub oversized: Vec<u64>,
}

// ---------------------------------------------------------------------------
// BacklogDoctor
// ---------------------------------------------------------------------------

/// Read-mostly backlog analyzer: staleness, lookalike pairs, oversized
/// checklists. Flags findings with labels; never closes or deletes.
pub struct BacklogDoctor {
    store: Arc<dyn IssueStore>,
}

impl BacklogDoctor {
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self { store }
    }

    fn open_issues(&self) -> Result<Vec<Issue>> {
        self.store.list_issues(IssueState::Open)
    }

    /// Issues with no update (falling back to creation) in `days` days.
    pub fn find_stale_issues(&self, days: i64) -> Result<Vec<Issue>> {
        let now = Utc::now();
        Ok(self
            .open_issues()?
            .into_iter()
            .filter(|issue| {
                let last = issue.updated_at.unwrap_or(issue.created_at);
                (now - last).num_days() > days
            })
            .collect())
    }

    /// Issues whose body carries more than `limit` checklist items.
    pub fn find_oversized_issues(&self, limit: usize) -> Result<Vec<Issue>> {
        Ok(self
            .open_issues()?
            .into_iter()
            .filter(|issue| checklist_items(&issue.body) > limit)
            .collect())
    }

    /// Pairs of open issues whose title or body similarity reaches
    /// `threshold`.
    pub fn find_duplicate_candidates(
        &self,
        threshold: f64,
    ) -> Result<Vec<(Issue, Issue, f64)>> {
        let issues = self.open_issues()?;
        let mut pairs = Vec::new();
        for i in 0..issues.len() {
            for j in (i + 1)..issues.len() {
                let (a, b) = (&issues[i], &issues[j]);
                let title_sim = similarity(&a.title.to_lowercase(), &b.title.to_lowercase());
                let body_sim = similarity(&a.body.to_lowercase(), &b.body.to_lowercase());
                let sim = title_sim.max(body_sim);
                if sim >= threshold {
                    pairs.push((a.clone(), b.clone(), sim));
                }
            }
        }
        Ok(pairs)
    }

    /// Run the selected checks and apply the corresponding labels.
    pub fn run(&self, opts: &DoctorOptions) -> Result<DoctorReport> {
        let mut report = DoctorReport::default();

        if opts.check_stale {
            for issue in self.find_stale_issues(opts.stale_days)? {
                report.stale.push(issue.number);
                self.flag(issue.number, STALE_LABEL);
            }
        }

        if opts.check_oversized {
            for issue in self.find_oversized_issues(opts.checklist_limit)? {
                report.oversized.push(issue.number);
                self.flag(issue.number, OVERSIZED_LABEL);
            }
        }

        if opts.check_duplicates {
            for (a, b, _) in self.find_duplicate_candidates(opts.duplicate_threshold)? {
                report.duplicates.push((a.number, b.number));
                self.flag(a.number, DUPLICATE_LABEL);
                self.flag(b.number, DUPLICATE_LABEL);
            }
        }

        Ok(report)
    }

    fn flag(&self, number: u64, label: &str) {
        if let Err(e) = self
            .store
            .update_issue_labels(number, &[label.to_string()], &[])
        {
            tracing::warn!(issue = number, label, "backlog flag failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Dice coefficient over character bigram multisets. 1.0 for identical
/// strings, 0.0 when nothing overlaps.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let ga = bigrams(a);
    let gb = bigrams(b);
    let total: usize = ga.values().sum::<usize>() + gb.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }
    let common: usize = ga
        .iter()
        .map(|(gram, count)| count.min(gb.get(gram).unwrap_or(&0)))
        .sum();
    (2 * common) as f64 / total as f64
}

fn bigrams(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().collect();
    let mut grams = HashMap::new();
    for pair in chars.windows(2) {
        *grams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    grams
}

/// Count markdown checklist items (`- [ ]` / `- [x]`).
fn checklist_items(body: &str) -> usize {
    body.lines()
        .filter(|line| line.trim_start().starts_with("- ["))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
