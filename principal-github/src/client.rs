//! `gh`-backed implementation of [`principal_core::PlatformClient`]
//!
//! Wraps the host's authenticated `gh` CLI instead of embedding a library
//! HTTP client, which keeps auth portable across whatever credential the
//! operator already has `gh` configured with. Every call retries transient
//! failures with bounded exponential backoff and enforces a per-call
//! timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use principal_core::platform::{Issue, IssueState, PlatformClient, PrState, PullRequest};
use principal_core::Result as CoreResult;

use crate::error::{Error, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const ISSUE_LIST_LIMIT: &str = "200";

/// Thin typed wrapper over `gh issue` / `gh pr` invocations
pub struct GhClient {
    repo: Option<String>,
    gh_bin: String,
    timeout: Duration,
    max_retries: u32,
}

impl Default for GhClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GhClient {
    /// Target whatever repo `gh` infers from the current directory. The
    /// binary defaults to `gh` on `PATH`.
    pub fn new() -> Self {
        Self {
            repo: None,
            gh_bin: "gh".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Target a specific `owner/repo` instead of relying on `gh`'s
    /// cwd-based inference.
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Override the `gh` binary path, e.g. from `PRINCIPAL_GH_BIN` or `--gh-bin`.
    pub fn with_gh_bin(mut self, bin: impl Into<String>) -> Self {
        self.gh_bin = bin.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn backoff(&self, attempt: u32) {
        let millis = 500u64.saturating_mul(1u64 << attempt.min(4));
        tokio::time::sleep(Duration::from_millis(millis.min(8_000))).await;
    }

    /// Run `gh <args> --repo <repo>`, retrying transient failures.
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let joined = args.join(" ");
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let mut cmd = tokio::process::Command::new(&self.gh_bin);
            cmd.args(args);
            if let Some(repo) = &self.repo {
                cmd.args(["--repo", repo]);
            }

            let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(source)) => {
                    return Err(Error::Spawn {
                        bin: self.gh_bin.clone(),
                        source,
                    })
                }
                Err(_) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Timeout {
                            args: joined,
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    warn!(args = %joined, attempt, "gh call timed out, retrying");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            if output.status.success() {
                return Ok(output.stdout);
            }

            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if is_transient(&stderr) && attempt < self.max_retries {
                warn!(args = %joined, attempt, %stderr, "gh call failed transiently, retrying");
                self.backoff(attempt).await;
                continue;
            }

            return Err(Error::CommandFailed {
                args: joined,
                code: output.status.code(),
                stderr,
            });
        }
    }

    async fn run_json<T: for<'de> Deserialize<'de>>(&self, args: &[&str]) -> Result<T> {
        let bytes = self.run(args).await?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Parse {
            args: args.join(" "),
            source,
        })
    }
}

fn is_transient(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    [
        "rate limit",
        "timeout",
        "timed out",
        "temporarily unavailable",
        "connection reset",
        "502",
        "503",
        "could not resolve host",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
}

impl From<GhIssue> for Issue {
    fn from(raw: GhIssue) -> Self {
        Issue {
            number: raw.number,
            body: raw.body.unwrap_or_default(),
            state: if raw.state.eq_ignore_ascii_case("open") {
                IssueState::Open
            } else {
                IssueState::Closed
            },
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhPr {
    number: u64,
    state: String,
    #[serde(rename = "mergedAt")]
    merged_at: Option<String>,
}

impl From<GhPr> for PullRequest {
    fn from(raw: GhPr) -> Self {
        let state = if raw.state.eq_ignore_ascii_case("merged") || raw.merged_at.is_some() {
            PrState::Merged
        } else if raw.state.eq_ignore_ascii_case("closed") {
            PrState::Closed
        } else {
            PrState::Open
        };

        PullRequest {
            number: raw.number,
            state,
            head_branch: String::new(),
        }
    }
}

#[async_trait]
impl PlatformClient for GhClient {
    async fn list_issues_by_label(&self, label: &str) -> CoreResult<Vec<Issue>> {
        let raw: Vec<GhIssue> = self
            .run_json(&[
                "issue",
                "list",
                "--state",
                "open",
                "--label",
                label,
                "--limit",
                ISSUE_LIST_LIMIT,
                "--json",
                "number,body,state,labels",
            ])
            .await?;

        Ok(raw.into_iter().map(Issue::from).collect())
    }

    async fn list_pending_issues(
        &self,
        task_label: &str,
        blocking_labels: &[&str],
    ) -> CoreResult<Vec<Issue>> {
        let candidates = self.list_issues_by_label(task_label).await?;
        Ok(candidates
            .into_iter()
            .filter(|issue| !blocking_labels.iter().any(|b| issue.has_label(b)))
            .collect())
    }

    async fn count_open_issues(&self, task_label: &str) -> CoreResult<u64> {
        let issues = self.list_issues_by_label(task_label).await?;
        Ok(issues.len() as u64)
    }

    async fn add_label(&self, issue_number: u64, label: &str) -> CoreResult<()> {
        let number = issue_number.to_string();
        self.run(&["issue", "edit", &number, "--add-label", label])
            .await?;
        debug!(issue = issue_number, label, "added label");
        Ok(())
    }

    async fn remove_label(&self, issue_number: u64, label: &str) -> CoreResult<()> {
        let number = issue_number.to_string();
        self.run(&["issue", "edit", &number, "--remove-label", label])
            .await?;
        debug!(issue = issue_number, label, "removed label");
        Ok(())
    }

    async fn is_pr_merged(&self, pr_number: u64) -> CoreResult<bool> {
        let number = pr_number.to_string();
        let raw: GhPr = self
            .run_json(&["pr", "view", &number, "--json", "number,state,mergedAt"])
            .await?;
        Ok(PullRequest::from(raw).is_merged())
    }

    async fn close_issue(&self, issue_number: u64) -> CoreResult<()> {
        let number = issue_number.to_string();
        self.run(&["issue", "close", &number]).await?;
        Ok(())
    }

    async fn find_pr_by_branch(&self, branch: &str) -> CoreResult<u64> {
        #[derive(Debug, Deserialize)]
        struct PrNumber {
            number: u64,
        }

        let raw: Vec<PrNumber> = self
            .run_json(&[
                "pr", "list", "--head", branch, "--state", "open", "--json", "number", "--limit",
                "1",
            ])
            .await?;

        Ok(raw.first().map(|p| p.number).unwrap_or(0))
    }

    async fn get_issue_body(&self, issue_number: u64) -> CoreResult<String> {
        #[derive(Debug, Deserialize)]
        struct Body {
            body: Option<String>,
        }

        let number = issue_number.to_string();
        let raw: Body = self
            .run_json(&["issue", "view", &number, "--json", "body"])
            .await?;
        Ok(raw.body.unwrap_or_default())
    }

    async fn update_issue_body(&self, issue_number: u64, body: &str) -> CoreResult<()> {
        let number = issue_number.to_string();
        self.run(&["issue", "edit", &number, "--body", body])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_error_detection() {
        assert!(is_transient("API rate limit exceeded"));
        assert!(is_transient("HTTP 503 Service Unavailable"));
        assert!(!is_transient("gh: issue not found"));
    }

    #[test]
    fn issue_conversion_maps_open_state_and_labels() {
        let raw = GhIssue {
            number: 42,
            body: Some("hello".to_string()),
            state: "OPEN".to_string(),
            labels: vec![
                GhLabel {
                    name: "ai-task".to_string(),
                },
                GhLabel {
                    name: "in-progress".to_string(),
                },
            ],
        };
        let issue: Issue = raw.into();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.state, IssueState::Open);
        assert!(issue.has_label("in-progress"));
    }

    #[test]
    fn pr_conversion_treats_merged_at_as_merged() {
        let raw = GhPr {
            number: 7,
            state: "closed".to_string(),
            merged_at: Some("2024-01-01T00:00:00Z".to_string()),
        };
        let pr: PullRequest = raw.into();
        assert!(pr.is_merged());
    }

    #[test]
    fn pr_conversion_open_state() {
        let raw = GhPr {
            number: 7,
            state: "open".to_string(),
            merged_at: None,
        };
        let pr: PullRequest = raw.into();
        assert!(!pr.is_merged());
    }
}
