//! Resolves a pull-request number for an issue from whatever evidence exists
//!
//! Tries, in order: the Worker's result file, then a body-text scan against
//! three precedence-ordered patterns, then a branch-name lookup against the
//! platform. Returns 0 when nothing resolves.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::platform::PlatformClient;
use crate::Result;

#[derive(Debug, Deserialize)]
struct ResultFile {
    pr_number: Option<u64>,
    pr_url: Option<String>,
}

fn full_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"github\.com/[^/]+/[^/]+/pull/(\d+)").unwrap())
}

fn relative_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/pull/(\d+)(?:[^\d]|$)").unwrap())
}

fn explicit_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:PR\s*#|pull\s+request\s*#)(\d+)").unwrap())
}

/// Scan `text` for a PR number using the three precedence-ordered patterns.
///
/// Bare `#N` never matches -- it would collide with issue references like
/// `Fixes #123`.
pub fn scan_text_for_pr_number(text: &str) -> Option<u64> {
    for re in [full_url_re(), relative_url_re(), explicit_ref_re()] {
        if let Some(caps) = re.captures(text) {
            if let Some(m) = caps.get(1) {
                if let Ok(n) = m.as_str().parse() {
                    return Some(n);
                }
            }
        }
    }
    None
}

fn read_result_file(state_root: &Path, issue_number: u64) -> Option<ResultFile> {
    let path = state_root
        .join("results")
        .join(format!("issue-{issue_number}.json"));
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Resolve a PR number for `issue_number`, whose body is `body`.
///
/// `state_root` is the directory containing `results/issue-<N>.json`.
pub async fn extract_pr_number(
    client: &dyn PlatformClient,
    state_root: &Path,
    issue_number: u64,
    body: &str,
) -> Result<u64> {
    if let Some(result) = read_result_file(state_root, issue_number) {
        if let Some(n) = result.pr_number {
            return Ok(n);
        }
        if let Some(url) = result.pr_url {
            if let Some(n) = scan_text_for_pr_number(&url) {
                return Ok(n);
            }
        }
    }

    if let Some(n) = scan_text_for_pr_number(body) {
        return Ok(n);
    }

    let branch = format!("feat/ai-issue-{issue_number}");
    let n = client.find_pr_by_branch(&branch).await?;
    Ok(n)
}
