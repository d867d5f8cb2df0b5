use crate::error::{AutonomyError, Result};
use crate::types::{Issue, IssueState};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// IssueStore
// ---------------------------------------------------------------------------

/// Capability surface over the external issue tracker. GitHub is the sole
/// source of truth; everything here reads or mutates remote state.
///
/// Mutators return `Ok(false)` when the remote refuses the change and `Err`
/// only for transport-level failures. Retry/backoff is the transport's
/// concern, never the core's.
pub trait IssueStore: Send + Sync {
    /// Fully materialized list — no pagination cursor leaks to callers.
    fn list_issues(&self, state: IssueState) -> Result<Vec<Issue>>;
    fn get_issue(&self, number: u64) -> Result<Option<Issue>>;
    /// Idempotent: re-applying an add/remove set that is already in effect
    /// still reports success.
    fn update_issue_labels(&self, number: u64, add: &[String], remove: &[String]) -> Result<bool>;
    fn update_issue_state(&self, number: u64, state: IssueState) -> Result<bool>;
    fn add_comment(&self, number: u64, body: &str) -> Result<bool>;
    fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<Option<u64>>;
}

/// Callback invoked synchronously after a successful label or state
/// mutation. Host wiring uses this to connect mutations to the hierarchy
/// scheduler without the components knowing about each other.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// GithubClient
// ---------------------------------------------------------------------------

/// Blocking REST v3 client implementing [`IssueStore`].
pub struct GithubClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
    on_change: RwLock<Option<ChangeListener>>,
}

impl GithubClient {
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, owner, repo, "https://api.github.com")
    }

    /// Point the client at a different API host (test servers).
    pub fn with_base_url(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| AutonomyError::Github(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            on_change: RwLock::new(None),
        })
    }

    pub fn project_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Register the post-mutation listener. Interior mutability so wiring
    /// can happen after the client is shared.
    pub fn set_change_listener(&self, listener: ChangeListener) {
        let mut slot = self.on_change.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(listener);
    }

    fn notify_change(&self) {
        let slot = self.on_change.read().unwrap_or_else(|e| e.into_inner());
        if let Some(listener) = slot.as_ref() {
            listener();
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.base_url, self.owner, self.repo, path)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response> {
        req.header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "autonomy")
            .send()
            .map_err(|e| AutonomyError::Github(e.to_string()))
    }
}

impl IssueStore for GithubClient {
    fn list_issues(&self, state: IssueState) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}?state={}&per_page=100&page={page}",
                self.repo_url("/issues"),
                state.as_str()
            );
            let resp = self.send(self.http.get(&url))?;
            if !resp.status().is_success() {
                return Err(AutonomyError::Github(format!(
                    "list_issues: HTTP {}",
                    resp.status()
                )));
            }
            let raw: Vec<RawIssue> = resp
                .json()
                .map_err(|e| AutonomyError::Github(e.to_string()))?;
            let count = raw.len();
            for item in raw {
                // The issues endpoint also returns pull requests; skip them.
                if item.pull_request.is_some() {
                    continue;
                }
                issues.push(item.into_issue()?);
            }
            if count < 100 {
                return Ok(issues);
            }
            page += 1;
        }
    }

    fn get_issue(&self, number: u64) -> Result<Option<Issue>> {
        let url = self.repo_url(&format!("/issues/{number}"));
        let resp = self.send(self.http.get(&url))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(AutonomyError::Github(format!(
                "get_issue #{number}: HTTP {}",
                resp.status()
            )));
        }
        let raw: RawIssue = resp
            .json()
            .map_err(|e| AutonomyError::Github(e.to_string()))?;
        Ok(Some(raw.into_issue()?))
    }

    fn update_issue_labels(&self, number: u64, add: &[String], remove: &[String]) -> Result<bool> {
        let Some(issue) = self.get_issue(number)? else {
            return Ok(false);
        };
        let mut labels: Vec<String> = issue
            .labels
            .into_iter()
            .filter(|l| !remove.contains(l))
            .collect();
        for label in add {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }

        let url = self.repo_url(&format!("/issues/{number}"));
        let resp = self.send(self.http.patch(&url).json(&json!({ "labels": labels })))?;
        if resp.status().is_success() {
            self.notify_change();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn update_issue_state(&self, number: u64, state: IssueState) -> Result<bool> {
        let url = self.repo_url(&format!("/issues/{number}"));
        let resp = self.send(self.http.patch(&url).json(&json!({ "state": state.as_str() })))?;
        if resp.status().is_success() {
            self.notify_change();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<bool> {
        let url = self.repo_url(&format!("/issues/{number}/comments"));
        let resp = self.send(self.http.post(&url).json(&json!({ "body": body })))?;
        Ok(resp.status().is_success())
    }

    fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<Option<u64>> {
        let url = self.repo_url("/pulls");
        let payload = json!({ "title": title, "body": body, "head": head, "base": base });
        let resp = self.send(self.http.post(&url).json(&payload))?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let value: Value = resp
            .json()
            .map_err(|e| AutonomyError::Github(e.to_string()))?;
        Ok(value.get("number").and_then(Value::as_u64))
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Named { name: String },
    Plain(String),
}

impl RawLabel {
    fn into_name(self) -> String {
        match self {
            RawLabel::Named { name } => name,
            RawLabel::Plain(name) => name,
        }
    }
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    assignee: Option<RawUser>,
    #[serde(default)]
    assignees: Vec<RawUser>,
    state: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pull_request: Option<Value>,
}

impl RawIssue {
    fn into_issue(self) -> Result<Issue> {
        Ok(Issue {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            labels: self.labels.into_iter().map(RawLabel::into_name).collect(),
            assignee: self.assignee.map(|u| u.login),
            assignees: self.assignees.into_iter().map(|u| u.login).collect(),
            state: self.state.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(server: &mockito::ServerGuard) -> GithubClient {
        GithubClient::with_base_url("t", "octo", "proj", server.url()).unwrap()
    }

    fn issue_json(number: u64, labels: &str) -> String {
        format!(
            r#"{{"number":{number},"title":"T{number}","body":"","labels":{labels},
                "state":"open","created_at":"2026-01-01T00:00:00Z"}}"#
        )
    }

    #[test]
    fn list_issues_parses_labels_and_skips_prs() {
        let mut server = mockito::Server::new();
        let body = format!(
            r#"[{},{},{{"number":9,"title":"pr","state":"open",
                "created_at":"2026-01-01T00:00:00Z","pull_request":{{}}}}]"#,
            issue_json(1, r#"[{"name":"bug"}]"#),
            issue_json(2, r#"["priority-high"]"#),
        );
        let _m = server
            .mock("GET", "/repos/octo/proj/issues")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create();

        let issues = client(&server).list_issues(IssueState::Open).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].labels, vec!["bug"]);
        assert_eq!(issues[1].labels, vec!["priority-high"]);
    }

    #[test]
    fn list_issues_error_status_is_err() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/repos/octo/proj/issues")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create();
        assert!(client(&server).list_issues(IssueState::Open).is_err());
    }

    #[test]
    fn get_issue_404_is_none() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/repos/octo/proj/issues/5")
            .with_status(404)
            .create();
        assert!(client(&server).get_issue(5).unwrap().is_none());
    }

    #[test]
    fn update_labels_merges_and_notifies() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/repos/octo/proj/issues/2")
            .with_status(200)
            .with_body(issue_json(2, r#"["old","keep"]"#))
            .create();
        let patch = server
            .mock("PATCH", "/repos/octo/proj/issues/2")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"labels": ["keep", "new"]}),
            ))
            .with_status(200)
            .with_body("{}")
            .create();

        let c = client(&server);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        c.set_change_listener(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let ok = c
            .update_issue_labels(2, &["new".to_string()], &["old".to_string()])
            .unwrap();
        assert!(ok);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        patch.assert();
    }

    #[test]
    fn update_labels_missing_issue_is_false() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/repos/octo/proj/issues/2")
            .with_status(404)
            .create();
        let ok = client(&server)
            .update_issue_labels(2, &["x".to_string()], &[])
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn update_state_patches_state() {
        let mut server = mockito::Server::new();
        let patch = server
            .mock("PATCH", "/repos/octo/proj/issues/3")
            .match_body(mockito::Matcher::Json(serde_json::json!({"state": "closed"})))
            .with_status(200)
            .with_body("{}")
            .create();
        let ok = client(&server)
            .update_issue_state(3, IssueState::Closed)
            .unwrap();
        assert!(ok);
        patch.assert();
    }

    #[test]
    fn add_comment_posts_body() {
        let mut server = mockito::Server::new();
        let post = server
            .mock("POST", "/repos/octo/proj/issues/4/comments")
            .match_body(mockito::Matcher::Json(serde_json::json!({"body": "hi"})))
            .with_status(201)
            .with_body("{}")
            .create();
        assert!(client(&server).add_comment(4, "hi").unwrap());
        post.assert();
    }

    #[test]
    fn create_pull_request_returns_number() {
        let mut server = mockito::Server::new();
        let _post = server
            .mock("POST", "/repos/octo/proj/pulls")
            .with_status(201)
            .with_body(r#"{"number": 42}"#)
            .create();
        let pr = client(&server)
            .create_pull_request("t", "b", "shadow-abc", "main")
            .unwrap();
        assert_eq!(pr, Some(42));
    }

    #[test]
    fn create_pull_request_failure_is_none() {
        let mut server = mockito::Server::new();
        let _post = server
            .mock("POST", "/repos/octo/proj/pulls")
            .with_status(422)
            .create();
        let pr = client(&server)
            .create_pull_request("t", "b", "shadow-abc", "main")
            .unwrap();
        assert_eq!(pr, None);
    }
}
