//! `principal run` -- loop the decision engine and dispatch a hook command
//!
//! This is the "thin outer driver" the core spec describes: it ticks the
//! engine, hands the encoded `Decision` to an operator-supplied hook command
//! (one environment variable per `KEY=VALUE` line) for every decision that
//! names a side effect, and tracks `state/consecutive_failures` from the
//! hook's exit status. Implementing what the hook actually does -- spawning
//! a Worker, scoring a review, merging a PR -- is explicitly out of scope;
//! this loop only ever shells out to whatever the operator configured.

use std::process::Stdio;
use std::time::Duration;

use principal_core::{NextAction, StateStore};
use tracing::{info, warn};

use super::tick::run_one_tick;
use super::GlobalOpts;

/// Hard stop reasons: looping again cannot change the outcome.
fn is_hard_stop(reason: &str) -> bool {
    matches!(
        reason,
        "max_loop_reached" | "max_consecutive_failures" | "config_not_found" | "loop_count_error"
    )
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Shell command invoked once per tick with the decision as env vars.
    /// If omitted, `run` only prints each decision (useful for dry runs).
    #[arg(long)]
    pub on_decision: Option<String>,

    /// Seconds to sleep between ticks that did not reach a terminal state
    #[arg(long, default_value_t = 30)]
    pub interval_secs: u64,
}

impl RunArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let state = StateStore::new(self.global.state_dir.clone());

        loop {
            let decision = run_one_tick(&self.global).await;
            info!(decision = %decision.encode().replace('\n', " "), "tick");

            if self.global.dry_run {
                info!("dry-run: skipping hook invocation");
            } else if let Some(command) = &self.on_decision {
                match run_hook(command, &decision.encode()).await {
                    Ok(true) => {
                        let _ = state.write_consecutive_failures(0);
                    }
                    Ok(false) => {
                        let failures = state.read_consecutive_failures() + 1;
                        if let Err(e) = state.write_consecutive_failures(failures) {
                            warn!(error = %e, "failed to persist consecutive_failures");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to spawn hook command");
                        let failures = state.read_consecutive_failures() + 1;
                        let _ = state.write_consecutive_failures(failures);
                    }
                }
            }

            let action = decision.next_action.unwrap_or(NextAction::None);
            let reason = decision.exit_reason.as_deref().unwrap_or("");

            if action == NextAction::AllComplete {
                info!("all tracked work complete");
                return Ok(());
            }

            if action == NextAction::None && is_hard_stop(reason) {
                anyhow::bail!("stopping: {reason}");
            }

            tokio::time::sleep(Duration::from_secs(self.interval_secs)).await;
        }
    }
}

/// Run the hook command with `encoded`'s `KEY=VALUE` lines exported as
/// environment variables ahead of it, in the same shell. `encoded` is
/// `eval`-safe per the decision encoder's contract (single-quote escaped),
/// so it is sourced with `set -a` rather than split and re-quoted by hand --
/// a naive per-line split would hand the hook literal quote characters for
/// any field like `SPEC_NAME='my spec'`. Returns `Ok(true)` on a zero exit
/// status.
async fn run_hook(command: &str, encoded: &str) -> anyhow::Result<bool> {
    let script = format!("set -a\n{encoded}\nset +a\n{command}");

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd.stdin(Stdio::null());

    let status = cmd.status().await?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_stop_reasons_match_budget_exhaustion() {
        assert!(is_hard_stop("max_loop_reached"));
        assert!(is_hard_stop("max_consecutive_failures"));
        assert!(is_hard_stop("config_not_found"));
        assert!(is_hard_stop("loop_count_error"));
    }

    #[test]
    fn transient_reasons_are_not_hard_stops() {
        assert!(!is_hard_stop("github_api_error"));
        assert!(!is_hard_stop("no_actionable_tasks"));
        assert!(!is_hard_stop("needs_human_review"));
        assert!(!is_hard_stop("worker_failed"));
    }

    #[tokio::test]
    async fn hook_env_vars_round_trip_from_decision_encoding() {
        let ok = run_hook("test \"$ISSUE_NUMBER\" = 42", "NEXT_ACTION=dispatch_worker\nISSUE_NUMBER=42\n")
            .await
            .unwrap();
        assert!(ok);

        let not_ok = run_hook("test \"$ISSUE_NUMBER\" = 7", "NEXT_ACTION=dispatch_worker\nISSUE_NUMBER=42\n")
            .await
            .unwrap();
        assert!(!not_ok);
    }
}
