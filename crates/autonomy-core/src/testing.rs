//! In-memory [`IssueStore`] used across the crate's unit tests.

use crate::error::Result;
use crate::types::{Issue, IssueState};
use crate::github::IssueStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Labels {
        number: u64,
        add: Vec<String>,
        remove: Vec<String>,
    },
    State {
        number: u64,
        state: IssueState,
    },
    Comment {
        number: u64,
        body: String,
    },
    Pr {
        head: String,
        base: String,
    },
}

/// Records every mutation and applies it to the in-memory issue set.
#[derive(Default)]
pub struct TestStore {
    issues: Mutex<Vec<Issue>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_labels: AtomicBool,
}

impl TestStore {
    pub fn with_issues(issues: Vec<Issue>) -> Self {
        Self {
            issues: Mutex::new(issues),
            ..Self::default()
        }
    }

    /// Make subsequent label updates report failure.
    pub fn fail_label_updates(&self) {
        self.fail_labels.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    fn push_call(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl IssueStore for TestStore {
    fn list_issues(&self, state: IssueState) -> Result<Vec<Issue>> {
        Ok(self
            .issues
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.state == state)
            .cloned()
            .collect())
    }

    fn get_issue(&self, number: u64) -> Result<Option<Issue>> {
        Ok(self
            .issues
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.number == number)
            .cloned())
    }

    fn update_issue_labels(&self, number: u64, add: &[String], remove: &[String]) -> Result<bool> {
        if self.fail_labels.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.push_call(StoreCall::Labels {
            number,
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        if let Some(issue) = self
            .issues
            .lock()
            .unwrap()
            .iter_mut()
            .find(|i| i.number == number)
        {
            issue.labels.retain(|l| !remove.contains(l));
            for label in add {
                if !issue.labels.contains(label) {
                    issue.labels.push(label.clone());
                }
            }
        }
        Ok(true)
    }

    fn update_issue_state(&self, number: u64, state: IssueState) -> Result<bool> {
        self.push_call(StoreCall::State { number, state });
        if let Some(issue) = self
            .issues
            .lock()
            .unwrap()
            .iter_mut()
            .find(|i| i.number == number)
        {
            issue.state = state;
        }
        Ok(true)
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<bool> {
        self.push_call(StoreCall::Comment {
            number,
            body: body.to_string(),
        });
        Ok(true)
    }

    fn create_pull_request(
        &self,
        _title: &str,
        _body: &str,
        head: &str,
        base: &str,
    ) -> Result<Option<u64>> {
        self.push_call(StoreCall::Pr {
            head: head.to_string(),
            base: base.to_string(),
        });
        Ok(Some(101))
    }
}
