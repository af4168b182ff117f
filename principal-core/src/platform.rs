//! Platform client abstraction
//!
//! The decision engine is generic over a code-hosting platform so it can be
//! driven by a real CLI-backed client in production and a fake in-memory
//! client in tests. This module defines only the data types and the trait;
//! the implementation lives in `principal-github`.

use async_trait::async_trait;

use crate::Result;

/// Open/closed state of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
}

/// A code-host issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub body: String,
    pub state: IssueState,
    pub labels: Vec<String>,
}

impl Issue {
    /// Whether this issue carries the given label
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Merge state of a pull request, as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// A code-host pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub state: PrState,
    pub head_branch: String,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.state == PrState::Merged
    }
}

/// Typed wrapper over the code-hosting platform
///
/// Every method retries transient host/network failures with bounded
/// exponential backoff and a per-call timeout before surfacing an error;
/// non-transient failures (authentication, not-found) surface immediately.
/// Implementations must treat label mutations as idempotent from the
/// caller's perspective.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Open issues carrying `label`, including body and labels. Limited to 200.
    async fn list_issues_by_label(&self, label: &str) -> Result<Vec<Issue>>;

    /// Open issues labeled `task_label` that carry none of `blocking_labels`.
    async fn list_pending_issues(
        &self,
        task_label: &str,
        blocking_labels: &[&str],
    ) -> Result<Vec<Issue>>;

    /// Count of open issues carrying `task_label`.
    async fn count_open_issues(&self, task_label: &str) -> Result<u64>;

    /// Add a label to an issue. Idempotent.
    async fn add_label(&self, issue_number: u64, label: &str) -> Result<()>;

    /// Remove a label from an issue. Idempotent.
    async fn remove_label(&self, issue_number: u64, label: &str) -> Result<()>;

    /// Whether a pull request has been merged.
    async fn is_pr_merged(&self, pr_number: u64) -> Result<bool>;

    /// Close an issue.
    async fn close_issue(&self, issue_number: u64) -> Result<()>;

    /// Find an open pull request by head branch name. Returns 0 if none.
    async fn find_pr_by_branch(&self, branch: &str) -> Result<u64>;

    /// Fetch an issue's raw body text. Required only in epic tracking mode.
    async fn get_issue_body(&self, issue_number: u64) -> Result<String>;

    /// Replace an issue's body text. Required only in epic tracking mode.
    async fn update_issue_body(&self, issue_number: u64, body: &str) -> Result<()>;
}
