//! Spec tracking: resolving what open work exists for the active specs
//!
//! Two independent backends observe the same underlying concept, a named
//! spec's outstanding child tasks, through different storage: markdown
//! checkboxes on disk, or a GitHub tracking issue's checkbox list.

mod epic;
mod tasks_md;

pub use epic::{append_task_to_epic_body, find_actionable_task, parse_epic_body, EpicTask};
pub use tasks_md::FileSpecStatus as TaskStatus;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::platform::PlatformClient;
use crate::{Error, Result};

/// Resolves outstanding work across a set of active specs
pub struct SpecTracker {
    base_path: PathBuf,
    active_specs: Vec<String>,
}

impl SpecTracker {
    pub fn new(base_path: impl Into<PathBuf>, active_specs: Vec<String>) -> Self {
        Self {
            base_path: base_path.into(),
            active_specs,
        }
    }

    /// File-mode lookup: the first active spec with actionable status.
    pub fn next_file_mode(&self) -> Option<(String, TaskStatus)> {
        for spec in &self.active_specs {
            let status = tasks_md::scan_spec(&self.base_path, spec);
            if status != TaskStatus::NoWork {
                return Some((spec.clone(), status));
            }
        }
        None
    }

    /// Epic-mode lookup: the first active spec whose tracking issue has an
    /// unreferenced, unchecked task.
    ///
    /// Specs with no entry in `epic_issues` are skipped, not fatal. A spec
    /// whose tracking-issue body fetch fails is also skipped so one bad spec
    /// doesn't block the rest, but the failure is not swallowed: if no
    /// actionable task turns up anywhere, a failed fetch is reported as an
    /// error rather than folded into a silent "no work", since a platform
    /// outage here must not be reported as `no_actionable_tasks`.
    pub async fn next_epic_mode(
        &self,
        client: &dyn PlatformClient,
        epic_issues: &HashMap<String, u64>,
    ) -> Result<Option<(String, u64, EpicTask)>> {
        let mut any_error = false;

        for spec in &self.active_specs {
            let Some(&epic_issue) = epic_issues.get(spec) else {
                continue;
            };

            let body = match client.get_issue_body(epic_issue).await {
                Ok(body) => body,
                Err(_) => {
                    any_error = true;
                    continue;
                }
            };

            let tasks = parse_epic_body(&body);
            if let Some(task) = find_actionable_task(&tasks) {
                return Ok(Some((spec.clone(), epic_issue, task.clone())));
            }
        }

        if any_error {
            return Err(Error::Platform(
                "failed to fetch one or more epic tracking issue bodies".to_string(),
            ));
        }

        Ok(None)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
