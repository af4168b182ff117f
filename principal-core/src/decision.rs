//! The decision engine's output type and its `KEY=VALUE` wire encoding
//!
//! A [`Decision`] is produced exactly once per tick and consumed by a thin
//! outer driver that performs the corresponding side effect. It is encoded
//! as newline-separated `KEY=VALUE` pairs so a shell driver can `eval` it
//! directly; string fields that may contain whitespace or shell
//! metacharacters are single-quote escaped.

use std::borrow::Cow;
use std::fmt;

use crate::{Error, Result};

/// The action the outer driver should take this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    GenerateTasks,
    CreateTask,
    DispatchWorker,
    CheckResult,
    ReviewPr,
    AllComplete,
    None,
}

impl NextAction {
    fn as_str(self) -> &'static str {
        match self {
            NextAction::GenerateTasks => "generate_tasks",
            NextAction::CreateTask => "create_task",
            NextAction::DispatchWorker => "dispatch_worker",
            NextAction::CheckResult => "check_result",
            NextAction::ReviewPr => "review_pr",
            NextAction::AllComplete => "all_complete",
            NextAction::None => "none",
        }
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NextAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "generate_tasks" => NextAction::GenerateTasks,
            "create_task" => NextAction::CreateTask,
            "dispatch_worker" => NextAction::DispatchWorker,
            "check_result" => NextAction::CheckResult,
            "review_pr" => NextAction::ReviewPr,
            "all_complete" => NextAction::AllComplete,
            "none" => NextAction::None,
            other => return Err(Error::Other(format!("unknown next_action: {other}"))),
        })
    }
}

/// The specialized sub-mode for a worker dispatch triggered by a stuck PR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeIssue {
    Conflict,
    Rebase,
}

impl MergeIssue {
    fn as_str(self) -> &'static str {
        match self {
            MergeIssue::Conflict => "conflict",
            MergeIssue::Rebase => "rebase",
        }
    }
}

impl std::str::FromStr for MergeIssue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "conflict" => MergeIssue::Conflict,
            "rebase" => MergeIssue::Rebase,
            other => return Err(Error::Other(format!("unknown merge_issue: {other}"))),
        })
    }
}

/// The single next action the decision engine has chosen for this tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    pub next_action: Option<NextAction>,
    pub issue_number: Option<u64>,
    pub pr_number: Option<u64>,
    pub spec_name: Option<String>,
    pub task_line: Option<u64>,
    pub exit_reason: Option<String>,
    pub merge_issue: Option<MergeIssue>,
    pub epic_issue: Option<u64>,
    pub task_text: Option<String>,
}

impl Default for NextAction {
    fn default() -> Self {
        NextAction::None
    }
}

impl Decision {
    /// A `(none, reason)` decision -- the common shape for early exits
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            next_action: Some(NextAction::None),
            exit_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// A `check_result` decision for the given in-progress issue
    pub fn check_result(issue_number: u64) -> Self {
        Self {
            next_action: Some(NextAction::CheckResult),
            issue_number: Some(issue_number),
            ..Default::default()
        }
    }

    /// A `review_pr` decision
    pub fn review_pr(issue_number: u64, pr_number: u64) -> Self {
        Self {
            next_action: Some(NextAction::ReviewPr),
            issue_number: Some(issue_number),
            pr_number: Some(pr_number),
            ..Default::default()
        }
    }

    /// A `dispatch_worker` decision, optionally carrying a merge-issue sub-mode
    pub fn dispatch_worker(
        issue_number: u64,
        pr_number: Option<u64>,
        merge_issue: Option<MergeIssue>,
    ) -> Self {
        Self {
            next_action: Some(NextAction::DispatchWorker),
            issue_number: Some(issue_number),
            pr_number,
            merge_issue,
            ..Default::default()
        }
    }

    /// A `create_task` decision in epic mode
    pub fn create_task_epic(spec_name: impl Into<String>, epic_issue: u64, task_text: impl Into<String>) -> Self {
        Self {
            next_action: Some(NextAction::CreateTask),
            spec_name: Some(spec_name.into()),
            epic_issue: Some(epic_issue),
            task_text: Some(task_text.into()),
            ..Default::default()
        }
    }

    /// A `create_task` decision in file mode
    pub fn create_task_file(spec_name: impl Into<String>, task_line: u64) -> Self {
        Self {
            next_action: Some(NextAction::CreateTask),
            spec_name: Some(spec_name.into()),
            task_line: Some(task_line),
            ..Default::default()
        }
    }

    /// A `generate_tasks` decision
    pub fn generate_tasks(spec_name: impl Into<String>) -> Self {
        Self {
            next_action: Some(NextAction::GenerateTasks),
            spec_name: Some(spec_name.into()),
            ..Default::default()
        }
    }

    /// The `all_complete` decision
    pub fn all_complete() -> Self {
        Self {
            next_action: Some(NextAction::AllComplete),
            ..Default::default()
        }
    }

    /// Encode as newline-separated `KEY=VALUE` pairs, `NEXT_ACTION` first.
    pub fn encode(&self) -> String {
        let mut lines = Vec::new();

        let action = self.next_action.unwrap_or(NextAction::None);
        lines.push(format!("NEXT_ACTION={action}"));

        if let Some(n) = self.issue_number {
            lines.push(format!("ISSUE_NUMBER={n}"));
        }
        if let Some(n) = self.pr_number {
            lines.push(format!("PR_NUMBER={n}"));
        }
        if let Some(ref s) = self.spec_name {
            lines.push(format!("SPEC_NAME={}", quote(s)));
        }
        if let Some(n) = self.task_line {
            lines.push(format!("TASK_LINE={n}"));
        }
        if let Some(ref s) = self.exit_reason {
            lines.push(format!("EXIT_REASON={s}"));
        }
        if let Some(m) = self.merge_issue {
            lines.push(format!("MERGE_ISSUE={}", m.as_str()));
        }
        if let Some(n) = self.epic_issue {
            lines.push(format!("EPIC_ISSUE={n}"));
        }
        if let Some(ref s) = self.task_text {
            lines.push(format!("TASK_TEXT={}", quote(s)));
        }

        lines.push(String::new());
        lines.join("\n")
    }

    /// Parse a `KEY=VALUE` stream produced by [`Decision::encode`]
    pub fn decode(input: &str) -> Result<Self> {
        let mut decision = Decision::default();

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::Other(format!("malformed decision line: {line}")))?;

            match key {
                "NEXT_ACTION" => decision.next_action = Some(value.parse()?),
                "ISSUE_NUMBER" => decision.issue_number = Some(parse_u64(value)?),
                "PR_NUMBER" => decision.pr_number = Some(parse_u64(value)?),
                "SPEC_NAME" => decision.spec_name = Some(unquote(value)),
                "TASK_LINE" => decision.task_line = Some(parse_u64(value)?),
                "EXIT_REASON" => decision.exit_reason = Some(value.to_string()),
                "MERGE_ISSUE" => decision.merge_issue = Some(value.parse()?),
                "EPIC_ISSUE" => decision.epic_issue = Some(parse_u64(value)?),
                "TASK_TEXT" => decision.task_text = Some(unquote(value)),
                other => return Err(Error::Other(format!("unknown decision key: {other}"))),
            }
        }

        Ok(decision)
    }
}

fn parse_u64(value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::Other(format!("expected integer, got {value:?}")))
}

/// Single-quote shell-escape a string for embedding in `KEY=VALUE` output
fn quote(s: &str) -> String {
    match shell_escape::escape(Cow::Borrowed(s)) {
        Cow::Borrowed(b) => b.to_string(),
        Cow::Owned(o) => o,
    }
}

/// Reverse [`quote`] for a value that may or may not have been quoted
fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].replace("'\\''", "'")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_dispatch_worker() {
        let d = Decision::dispatch_worker(42, None, None);
        let encoded = d.encode();
        assert!(encoded.starts_with("NEXT_ACTION=dispatch_worker\n"));
        assert!(encoded.contains("ISSUE_NUMBER=42"));
    }

    #[test]
    fn encode_review_pr() {
        let d = Decision::review_pr(20, 77);
        let encoded = d.encode();
        assert!(encoded.contains("NEXT_ACTION=review_pr"));
        assert!(encoded.contains("ISSUE_NUMBER=20"));
        assert!(encoded.contains("PR_NUMBER=77"));
    }

    #[test]
    fn quotes_spec_name_with_spaces() {
        let d = Decision::create_task_epic("my spec", 100, "Add logout");
        let encoded = d.encode();
        assert!(encoded.contains("SPEC_NAME='my spec'"));
        assert!(encoded.contains("TASK_TEXT='Add logout'"));
    }

    #[test]
    fn round_trip_all_fields() {
        let d = Decision {
            next_action: Some(NextAction::DispatchWorker),
            issue_number: Some(5),
            pr_number: Some(9),
            spec_name: Some("feature a".to_string()),
            task_line: Some(3),
            exit_reason: Some("ok".to_string()),
            merge_issue: Some(MergeIssue::Conflict),
            epic_issue: Some(100),
            task_text: Some("do the thing".to_string()),
        };

        let encoded = d.encode();
        let decoded = Decision::decode(&encoded).unwrap();
        assert_eq!(d, decoded);
    }

    #[test]
    fn round_trip_none_decision() {
        let d = Decision::none("no_actionable_tasks");
        let decoded = Decision::decode(&d.encode()).unwrap();
        assert_eq!(d, decoded);
    }

    #[test]
    fn round_trip_quoted_text_with_apostrophe() {
        let d = Decision::create_task_epic("spec", 1, "don't break this");
        let decoded = Decision::decode(&d.encode()).unwrap();
        assert_eq!(decoded.task_text.as_deref(), Some("don't break this"));
    }

    #[test]
    fn all_complete_encodes_bare() {
        let d = Decision::all_complete();
        assert_eq!(d.encode(), "NEXT_ACTION=all_complete\n");
    }
}
