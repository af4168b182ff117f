//! Configuration management for the Principal decision engine
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (PRINCIPAL_*)
//! 3. Config file (`.ai/principal.yml` by default)
//! 4. Default values

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How child-task progress is tracked for a spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Scan `tasks.md` files under the spec directory for unlinked checkboxes
    TasksMd,
    /// Parse a designated GitHub tracking issue's checkbox list
    GithubEpic,
}

impl Default for TrackingMode {
    fn default() -> Self {
        TrackingMode::TasksMd
    }
}

/// Tracking configuration for specs
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Which backend resolves open work for a spec
    pub mode: TrackingMode,
    /// Map of spec name to the GitHub tracking issue number (epic mode only)
    pub epic_issues: HashMap<String, u64>,
}

/// Spec-tracking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpecsConfig {
    /// Root directory containing spec folders
    pub base_path: PathBuf,
    /// Ordered list of active spec names
    pub active: Vec<String>,
    /// Tracking backend configuration
    pub tracking: TrackingConfig,
}

impl Default for SpecsConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(".ai/specs"),
            active: Vec::new(),
            tracking: TrackingConfig::default(),
        }
    }
}

/// Reserved, overridable label names used to drive the decision engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Labels {
    pub task: String,
    pub in_progress: String,
    pub pr_ready: String,
    pub review_failed: String,
    pub merge_conflict: String,
    pub needs_rebase: String,
    pub worker_failed: String,
    pub needs_human_review: String,
    pub completed: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            task: "ai-task".to_string(),
            in_progress: "in-progress".to_string(),
            pr_ready: "pr-ready".to_string(),
            review_failed: "review-failed".to_string(),
            merge_conflict: "merge-conflict".to_string(),
            needs_rebase: "needs-rebase".to_string(),
            worker_failed: "worker-failed".to_string(),
            needs_human_review: "needs-human-review".to_string(),
            completed: "completed".to_string(),
        }
    }
}

impl Labels {
    /// Labels that mark an issue as blocked from a fresh dispatch
    ///
    /// A pending issue is `Task`-labeled and carries none of these.
    pub fn blocking(&self) -> [&str; 7] {
        [
            self.in_progress.as_str(),
            self.pr_ready.as_str(),
            self.review_failed.as_str(),
            self.merge_conflict.as_str(),
            self.needs_rebase.as_str(),
            self.worker_failed.as_str(),
            self.needs_human_review.as_str(),
        ]
    }
}

/// GitHub-related configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Label name overrides
    pub labels: Labels,
}

/// Escalation and retry-budget configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Per-PR review retry cap before escalating to human review
    pub max_review_attempts: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_review_attempts: 3,
        }
    }
}

/// Root configuration structure for the Principal workflow
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Spec tracking configuration
    pub specs: SpecsConfig,
    /// GitHub labels and overrides
    pub github: GithubConfig,
    /// Escalation / retry budgets
    pub escalation: EscalationConfig,
}

impl Config {
    /// Default config file path, relative to the repository root
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(".ai/principal.yml")
    }

    /// Load configuration from the default path
    ///
    /// Returns `Err(Error::ConfigMissing)` if the file does not exist -- per
    /// the decision engine's contract this is the only early-exit the loader
    /// is allowed to produce.
    pub fn load() -> Result<Self> {
        Self::load_from_file(&Self::default_config_path())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigMissing(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - `PRINCIPAL_SPECS_BASE_PATH`: override `specs.base_path`
    /// - `PRINCIPAL_MAX_REVIEW_ATTEMPTS`: override `escalation.max_review_attempts`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_path) = std::env::var("PRINCIPAL_SPECS_BASE_PATH") {
            self.specs.base_path = PathBuf::from(base_path);
        }

        if let Ok(max_attempts) = std::env::var("PRINCIPAL_MAX_REVIEW_ATTEMPTS") {
            if let Ok(parsed) = max_attempts.parse() {
                self.escalation.max_review_attempts = parsed;
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, config_base_path: Option<PathBuf>) -> Self {
        if let Some(path) = config_base_path {
            self.specs.base_path = path;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        path: Option<&Path>,
        config_base_path: Option<PathBuf>,
    ) -> Result<Self> {
        let loaded = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::load()?,
        };

        Ok(loaded
            .with_env_overrides()
            .with_cli_overrides(config_base_path))
    }
}
