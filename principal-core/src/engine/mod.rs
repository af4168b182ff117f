//! The ordered decision procedure
//!
//! Each tick runs a strictly ordered sequence of checks; the first one that
//! produces an outcome wins and the rest are skipped. Checks are modeled as
//! private methods returning `Option<Decision>` rather than as one deeply
//! nested conditional, so each step can be driven in isolation by tests.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::Config;
use crate::decision::{Decision, MergeIssue, NextAction};
use crate::platform::{Issue, PlatformClient};
use crate::pr_extractor::extract_pr_number;
use crate::spec_tracker::{SpecTracker, TaskStatus};
use crate::state_store::StateStore;
use crate::config::TrackingMode;

/// Tick budget before the engine refuses to continue regardless of state
pub const MAX_LOOP: u64 = 1000;
/// Consecutive outer-driver failures before the engine refuses to continue
pub const MAX_CONSECUTIVE_FAILURES: u64 = 5;

/// Computes, but never executes, the next action for one tick
pub struct DecisionEngine<'a> {
    config: Config,
    state: StateStore,
    client: &'a dyn PlatformClient,
    state_root: PathBuf,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(config: Config, client: &'a dyn PlatformClient, state_root: impl Into<PathBuf>) -> Self {
        let state_root = state_root.into();
        let state = StateStore::new(&state_root);
        Self {
            config,
            state,
            client,
            state_root,
        }
    }

    fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// Run one tick of the decision procedure. Always returns a `Decision`
    /// -- failures are expressed as `(none, <reason>)` rather than a Rust
    /// error, matching the engine's propagation contract.
    pub async fn tick(&self) -> Decision {
        let loop_count = match self.state.increment_loop_count() {
            Ok(n) => n,
            Err(_) => return Decision::none("loop_count_error"),
        };
        if loop_count >= MAX_LOOP {
            return Decision::none("max_loop_reached");
        }

        if self.state.read_consecutive_failures() >= MAX_CONSECUTIVE_FAILURES {
            return Decision::none("max_consecutive_failures");
        }

        if let Some(decision) = self.step1_in_progress().await {
            return decision;
        }

        let mut api_error_seen = false;

        if let Some(decision) = self.step2_pr_ready(&mut api_error_seen).await {
            return decision;
        }
        if let Some(decision) = self.step2_3_review_failed_retry(&mut api_error_seen).await {
            return decision;
        }
        if let Some(decision) = self
            .step2_5_merge_issue(
                &mut api_error_seen,
                &self.config.github.labels.merge_conflict.clone(),
                MergeIssue::Conflict,
            )
            .await
        {
            return decision;
        }
        if let Some(decision) = self
            .step2_5_merge_issue(
                &mut api_error_seen,
                &self.config.github.labels.needs_rebase.clone(),
                MergeIssue::Rebase,
            )
            .await
        {
            return decision;
        }
        if let Some(decision) = self.step2_7_hard_blockers(&mut api_error_seen).await {
            return decision;
        }
        if let Some(decision) = self.step3_pending_dispatch(&mut api_error_seen).await {
            return decision;
        }
        if let Some(decision) = self.step4_task_creation(&mut api_error_seen).await {
            return decision;
        }
        if let Some(decision) = self.step5_completion(&mut api_error_seen).await {
            return decision;
        }

        self.step6_stalemate(api_error_seen)
    }

    /// Step 1 -- in-progress (critical). Failure here is fatal for the tick:
    /// the engine cannot prove no Worker is active and must not dispatch.
    async fn step1_in_progress(&self) -> Option<Decision> {
        let labels = &self.config.github.labels;
        match self.client.list_issues_by_label(&labels.in_progress).await {
            Err(_) => Some(Decision::none("github_api_error")),
            Ok(issues) => issues.first().map(|issue| Decision::check_result(issue.number)),
        }
    }

    /// Step 2 -- PR ready.
    async fn step2_pr_ready(&self, api_error_seen: &mut bool) -> Option<Decision> {
        let labels = self.config.github.labels.clone();
        let issues = match self.client.list_issues_by_label(&labels.pr_ready).await {
            Ok(issues) => issues,
            Err(_) => {
                *api_error_seen = true;
                return None;
            }
        };

        let issue = issues.first()?;
        let pr = self.resolve_pr(issue).await;

        if pr == 0 {
            self.relabel(issue.number, &labels.pr_ready, &labels.needs_human_review)
                .await;
            let mut decision = Decision::none("needs_human_review");
            decision.issue_number = Some(issue.number);
            return Some(decision);
        }

        Some(Decision::review_pr(issue.number, pr))
    }

    /// Step 2.3 -- review-failed retry.
    async fn step2_3_review_failed_retry(&self, api_error_seen: &mut bool) -> Option<Decision> {
        let labels = self.config.github.labels.clone();
        let issues = match self.client.list_issues_by_label(&labels.review_failed).await {
            Ok(issues) => issues,
            Err(_) => {
                *api_error_seen = true;
                return None;
            }
        };

        let issue = issues.first()?;
        let pr = self.resolve_pr(issue).await;

        if pr == 0 {
            self.relabel(issue.number, &labels.review_failed, &labels.needs_human_review)
                .await;
            let mut decision = Decision::none("needs_human_review");
            decision.issue_number = Some(issue.number);
            return Some(decision);
        }

        let attempts = self.state.read_review_attempts(pr);
        if attempts < u64::from(self.config.escalation.max_review_attempts) {
            match self.state.increment_review_attempts(pr) {
                Ok(_) => {
                    self.relabel(issue.number, &labels.review_failed, &labels.pr_ready)
                        .await;
                    Some(Decision::review_pr(issue.number, pr))
                }
                Err(_) => {
                    self.relabel(issue.number, &labels.review_failed, &labels.needs_human_review)
                        .await;
                    let mut decision = Decision::none("needs_human_review");
                    decision.issue_number = Some(issue.number);
                    Some(decision)
                }
            }
        } else {
            self.relabel(issue.number, &labels.review_failed, &labels.needs_human_review)
                .await;
            let mut decision = Decision::none("review_max_retries");
            decision.issue_number = Some(issue.number);
            decision.pr_number = Some(pr);
            Some(decision)
        }
    }

    /// Steps 2.5/2.6 -- merge conflict / needs rebase. The label is left in
    /// place; the dispatcher clears it after remediation so an aborted
    /// dispatch still converges on the next tick.
    async fn step2_5_merge_issue(
        &self,
        api_error_seen: &mut bool,
        label: &str,
        merge_issue: MergeIssue,
    ) -> Option<Decision> {
        let labels = self.config.github.labels.clone();
        let issues = match self.client.list_issues_by_label(label).await {
            Ok(issues) => issues,
            Err(_) => {
                *api_error_seen = true;
                return None;
            }
        };

        let issue = issues.first()?;
        let pr = self.resolve_pr(issue).await;

        if pr == 0 {
            self.relabel(issue.number, label, &labels.needs_human_review)
                .await;
            let mut decision = Decision::none("needs_human_review");
            decision.issue_number = Some(issue.number);
            return Some(decision);
        }

        Some(Decision::dispatch_worker(issue.number, Some(pr), Some(merge_issue)))
    }

    /// Step 2.7 -- hard blockers, terminal until a human intervenes.
    async fn step2_7_hard_blockers(&self, api_error_seen: &mut bool) -> Option<Decision> {
        let labels = self.config.github.labels.clone();

        match self.client.list_issues_by_label(&labels.worker_failed).await {
            Ok(issues) if !issues.is_empty() => return Some(Decision::none("worker_failed")),
            Ok(_) => {}
            Err(_) => *api_error_seen = true,
        }

        match self
            .client
            .list_issues_by_label(&labels.needs_human_review)
            .await
        {
            Ok(issues) if !issues.is_empty() => return Some(Decision::none("needs_human_review")),
            Ok(_) => {}
            Err(_) => *api_error_seen = true,
        }

        None
    }

    /// Step 3 -- pending dispatch, reclaiming orphaned issues along the way.
    async fn step3_pending_dispatch(&self, api_error_seen: &mut bool) -> Option<Decision> {
        let labels = self.config.github.labels.clone();
        let blocking = labels.blocking();

        let issues = match self
            .client
            .list_pending_issues(&labels.task, &blocking)
            .await
        {
            Ok(issues) => issues,
            Err(_) => {
                *api_error_seen = true;
                return None;
            }
        };

        for issue in &issues {
            let pr = self.resolve_pr(issue).await;
            if pr != 0 {
                match self.client.is_pr_merged(pr).await {
                    Ok(true) => {
                        if let Err(e) = self.client.close_issue(issue.number).await {
                            warn!(issue = issue.number, error = %e, "failed to close orphaned issue");
                        }
                        continue;
                    }
                    Ok(false) => {}
                    Err(_) => {
                        *api_error_seen = true;
                        continue;
                    }
                }
            }

            return Some(Decision::dispatch_worker(issue.number, None, None));
        }

        None
    }

    /// Step 4 -- task creation, mode-dependent.
    async fn step4_task_creation(&self, api_error_seen: &mut bool) -> Option<Decision> {
        let tracker = SpecTracker::new(
            self.config.specs.base_path.clone(),
            self.config.specs.active.clone(),
        );

        match self.config.specs.tracking.mode {
            TrackingMode::GithubEpic => {
                match tracker
                    .next_epic_mode(self.client, &self.config.specs.tracking.epic_issues)
                    .await
                {
                    Ok(Some((spec, epic_issue, task))) => {
                        Some(Decision::create_task_epic(spec, epic_issue, task.text))
                    }
                    Ok(None) => None,
                    Err(_) => {
                        *api_error_seen = true;
                        None
                    }
                }
            }
            TrackingMode::TasksMd => match tracker.next_file_mode() {
                Some((spec, TaskStatus::NeedsGeneration)) => Some(Decision::generate_tasks(spec)),
                Some((spec, TaskStatus::UnlinkedTask { line })) => {
                    Some(Decision::create_task_file(spec, line))
                }
                Some((_, TaskStatus::NoWork)) | None => None,
            },
        }
    }

    /// Step 5 -- completion. An earlier API error this tick means some other
    /// listing may have hidden real open work, so a clean `0` here must not
    /// be reported as completion either -- it falls through to the
    /// stalemate step, which upgrades to `github_api_error` instead.
    async fn step5_completion(&self, api_error_seen: &mut bool) -> Option<Decision> {
        match self
            .client
            .count_open_issues(&self.config.github.labels.task)
            .await
        {
            Ok(0) if !*api_error_seen => Some(Decision::all_complete()),
            Ok(_) => None,
            Err(_) => {
                *api_error_seen = true;
                None
            }
        }
    }

    /// Step 6 -- stalemate. Upgrades to `github_api_error` so the outer
    /// driver can distinguish transient darkness from true completion.
    fn step6_stalemate(&self, api_error_seen: bool) -> Decision {
        if api_error_seen {
            Decision::none("github_api_error")
        } else {
            Decision::none("no_actionable_tasks")
        }
    }

    async fn resolve_pr(&self, issue: &Issue) -> u64 {
        extract_pr_number(self.client, self.state_root(), issue.number, &issue.body)
            .await
            .unwrap_or(0)
    }

    async fn relabel(&self, issue_number: u64, remove: &str, add: &str) {
        if let Err(e) = self.client.remove_label(issue_number, remove).await {
            warn!(issue = issue_number, label = remove, error = %e, "failed to remove label");
        }
        if let Err(e) = self.client.add_label(issue_number, add).await {
            warn!(issue = issue_number, label = add, error = %e, "failed to add label");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::config::TrackingConfig;
    use crate::error::Error as CoreError;
    use crate::platform::IssueState;
    use crate::Result as CoreResult;

    /// In-memory platform double exercising the full priority ladder
    /// deterministically, with no external process involved.
    #[derive(Default)]
    struct FakeClient {
        issues: Mutex<Vec<Issue>>,
        failing_labels: Mutex<HashSet<String>>,
        branch_prs: Mutex<HashMap<String, u64>>,
        issue_bodies: Mutex<HashMap<u64, String>>,
        merged_prs: Mutex<HashSet<u64>>,
    }

    impl FakeClient {
        fn with_issues(issues: Vec<Issue>) -> Self {
            Self {
                issues: Mutex::new(issues),
                ..Default::default()
            }
        }

        fn fail(&self, label: &str) {
            self.failing_labels.lock().unwrap().insert(label.to_string());
        }
    }

    fn issue(number: u64, body: &str, labels: &[&str]) -> Issue {
        Issue {
            number,
            body: body.to_string(),
            state: IssueState::Open,
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[async_trait]
    impl PlatformClient for FakeClient {
        async fn list_issues_by_label(&self, label: &str) -> CoreResult<Vec<Issue>> {
            if self.failing_labels.lock().unwrap().contains(label) {
                return Err(CoreError::Platform(format!("transient failure on {label}")));
            }
            Ok(self
                .issues
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.has_label(label))
                .cloned()
                .collect())
        }

        async fn list_pending_issues(
            &self,
            task_label: &str,
            blocking_labels: &[&str],
        ) -> CoreResult<Vec<Issue>> {
            let candidates = self.list_issues_by_label(task_label).await?;
            Ok(candidates
                .into_iter()
                .filter(|i| !blocking_labels.iter().any(|b| i.has_label(b)))
                .collect())
        }

        async fn count_open_issues(&self, task_label: &str) -> CoreResult<u64> {
            Ok(self.list_issues_by_label(task_label).await?.len() as u64)
        }

        async fn add_label(&self, issue_number: u64, label: &str) -> CoreResult<()> {
            let mut issues = self.issues.lock().unwrap();
            if let Some(issue) = issues.iter_mut().find(|i| i.number == issue_number) {
                if !issue.has_label(label) {
                    issue.labels.push(label.to_string());
                }
            }
            Ok(())
        }

        async fn remove_label(&self, issue_number: u64, label: &str) -> CoreResult<()> {
            let mut issues = self.issues.lock().unwrap();
            if let Some(issue) = issues.iter_mut().find(|i| i.number == issue_number) {
                issue.labels.retain(|l| l != label);
            }
            Ok(())
        }

        async fn is_pr_merged(&self, pr_number: u64) -> CoreResult<bool> {
            Ok(self.merged_prs.lock().unwrap().contains(&pr_number))
        }

        async fn close_issue(&self, issue_number: u64) -> CoreResult<()> {
            let mut issues = self.issues.lock().unwrap();
            if let Some(issue) = issues.iter_mut().find(|i| i.number == issue_number) {
                issue.state = IssueState::Closed;
            }
            Ok(())
        }

        async fn find_pr_by_branch(&self, branch: &str) -> CoreResult<u64> {
            Ok(self
                .branch_prs
                .lock()
                .unwrap()
                .get(branch)
                .copied()
                .unwrap_or(0))
        }

        async fn get_issue_body(&self, issue_number: u64) -> CoreResult<String> {
            Ok(self
                .issue_bodies
                .lock()
                .unwrap()
                .get(&issue_number)
                .cloned()
                .unwrap_or_default())
        }

        async fn update_issue_body(&self, issue_number: u64, body: &str) -> CoreResult<()> {
            self.issue_bodies
                .lock()
                .unwrap()
                .insert(issue_number, body.to_string());
            Ok(())
        }
    }

    fn engine<'a>(config: Config, client: &'a FakeClient, state_root: &Path) -> DecisionEngine<'a> {
        DecisionEngine::new(config, client, state_root.to_path_buf())
    }

    #[tokio::test]
    async fn normal_dispatch() {
        let client = FakeClient::with_issues(vec![issue(42, "", &["ai-task"])]);
        let dir = TempDir::new().unwrap();
        let decision = engine(Config::default(), &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::DispatchWorker));
        assert_eq!(decision.issue_number, Some(42));
    }

    #[tokio::test]
    async fn respects_in_progress() {
        let client = FakeClient::with_issues(vec![
            issue(10, "", &["ai-task", "in-progress"]),
            issue(11, "", &["ai-task"]),
        ]);
        let dir = TempDir::new().unwrap();
        let decision = engine(Config::default(), &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::CheckResult));
        assert_eq!(decision.issue_number, Some(10));
    }

    #[tokio::test]
    async fn pr_ready_with_url_resolves_review() {
        let client = FakeClient::with_issues(vec![issue(
            20,
            "done, see https://github.com/o/r/pull/77",
            &["ai-task", "pr-ready"],
        )]);
        let dir = TempDir::new().unwrap();
        let decision = engine(Config::default(), &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::ReviewPr));
        assert_eq!(decision.issue_number, Some(20));
        assert_eq!(decision.pr_number, Some(77));
    }

    #[tokio::test]
    async fn review_exhausted_escalates_to_human_review() {
        let client = FakeClient::with_issues(vec![issue(
            30,
            "blocked, see pull/55",
            &["ai-task", "review-failed"],
        )]);
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("state/attempts")).unwrap();
        std::fs::write(dir.path().join("state/attempts/review-pr-55"), "3").unwrap();

        let decision = engine(Config::default(), &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::None));
        assert_eq!(decision.exit_reason.as_deref(), Some("review_max_retries"));

        let issues = client.issues.lock().unwrap();
        let issue = issues.iter().find(|i| i.number == 30).unwrap();
        assert!(issue.has_label("needs-human-review"));
        assert!(!issue.has_label("review-failed"));
    }

    #[tokio::test]
    async fn api_darkness_is_distinguished_from_completion() {
        let client = FakeClient::with_issues(vec![]);
        client.fail("pr-ready");
        let dir = TempDir::new().unwrap();

        let decision = engine(Config::default(), &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::None));
        assert_eq!(decision.exit_reason.as_deref(), Some("github_api_error"));
    }

    #[tokio::test]
    async fn epic_mode_creates_task_for_unreferenced_checkbox() {
        let client = FakeClient::with_issues(vec![]);
        client.issue_bodies.lock().unwrap().insert(
            100,
            "- [ ] #10 Done task (in-progress)\n- [ ] Add logout\n".to_string(),
        );

        let mut config = Config::default();
        config.specs.active = vec!["feature-a".to_string()];
        config.specs.tracking = TrackingConfig {
            mode: crate::config::TrackingMode::GithubEpic,
            epic_issues: HashMap::from([("feature-a".to_string(), 100)]),
        };

        let dir = TempDir::new().unwrap();
        let decision = engine(config, &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::CreateTask));
        assert_eq!(decision.spec_name.as_deref(), Some("feature-a"));
        assert_eq!(decision.epic_issue, Some(100));
        assert_eq!(decision.task_text.as_deref(), Some("Add logout"));
    }

    #[tokio::test]
    async fn all_complete_when_no_task_issues_remain() {
        let client = FakeClient::with_issues(vec![]);
        let dir = TempDir::new().unwrap();
        let decision = engine(Config::default(), &client, dir.path()).tick().await;

        assert_eq!(decision.next_action, Some(NextAction::AllComplete));
    }

    #[tokio::test]
    async fn max_loop_reached_after_budget_exhausted() {
        let client = FakeClient::with_issues(vec![]);
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        for _ in 0..MAX_LOOP {
            store.increment_loop_count().unwrap();
        }

        let decision = engine(Config::default(), &client, dir.path()).tick().await;
        assert_eq!(decision.next_action, Some(NextAction::None));
        assert_eq!(decision.exit_reason.as_deref(), Some("max_loop_reached"));
    }

    #[tokio::test]
    async fn max_consecutive_failures_stops_the_tick() {
        let client = FakeClient::with_issues(vec![]);
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        store
            .write_consecutive_failures(MAX_CONSECUTIVE_FAILURES)
            .unwrap();

        let decision = engine(Config::default(), &client, dir.path()).tick().await;
        assert_eq!(decision.next_action, Some(NextAction::None));
        assert_eq!(
            decision.exit_reason.as_deref(),
            Some("max_consecutive_failures")
        );
    }

    #[tokio::test]
    async fn loop_count_keeps_advancing_while_consecutive_failures_is_maxed() {
        let client = FakeClient::with_issues(vec![]);
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        store
            .write_consecutive_failures(MAX_CONSECUTIVE_FAILURES)
            .unwrap();

        let config = Config::default();
        for expected in 1..=3u64 {
            let decision = engine(config.clone(), &client, dir.path()).tick().await;
            assert_eq!(
                decision.exit_reason.as_deref(),
                Some("max_consecutive_failures")
            );
            assert_eq!(store.read_loop_count(), expected);
        }
    }
}
