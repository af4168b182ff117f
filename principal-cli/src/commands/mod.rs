//! Subcommand implementations
//!
//! Each subcommand is "thin wiring" in the sense the core spec requires: it
//! loads configuration, builds a [`principal_github::GhClient`] and a
//! [`principal_core::DecisionEngine`], and either prints one [`Decision`]
//! (`tick`) or loops doing so and invoking an operator-supplied hook command
//! for every decision that needs a side effect (`run`). No Worker, reviewer,
//! or merge logic lives here -- those are external collaborators per the
//! core spec's non-goals.

mod config;
mod run;
mod tick;

pub use config::ConfigArgs;
pub use run::RunArgs;
pub use tick::TickArgs;

use std::path::PathBuf;

use principal_core::Config;
use principal_github::GhClient;

/// Options shared by every subcommand that talks to the platform
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Path to the workflow config file
    #[arg(long, global = true, env = "PRINCIPAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory holding `state/` and `results/`
    #[arg(long, global = true, env = "PRINCIPAL_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// `owner/repo` to target; defaults to `gh`'s cwd-based inference
    #[arg(long, global = true, env = "PRINCIPAL_REPO")]
    pub repo: Option<String>,

    /// Override the `gh` binary on `PATH`
    #[arg(long, global = true, env = "PRINCIPAL_GH_BIN")]
    pub gh_bin: Option<String>,

    /// Compute and print decisions without invoking the hook command or any
    /// other side effect
    #[arg(long, global = true, env = "PRINCIPAL_DRY_RUN")]
    pub dry_run: bool,
}

impl GlobalOpts {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load_from_file(path)?,
            None => Config::load()?,
        };
        Ok(config
            .with_env_overrides()
            .with_cli_overrides(None))
    }

    pub fn build_client(&self) -> GhClient {
        let mut client = GhClient::new();
        if let Some(repo) = &self.repo {
            client = client.with_repo(repo.clone());
        }
        if let Some(bin) = &self.gh_bin {
            client = client.with_gh_bin(bin.clone());
        }
        client
    }
}
