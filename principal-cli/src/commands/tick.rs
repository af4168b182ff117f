//! `principal tick` -- run exactly one decision and print it

use principal_core::{Decision, DecisionEngine};

use super::GlobalOpts;

/// Run one tick of the decision engine and print the encoded `Decision`
#[derive(clap::Args, Debug)]
pub struct TickArgs {
    #[command(flatten)]
    pub global: GlobalOpts,
}

impl TickArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decision = run_one_tick(&self.global).await;
        print!("{}", decision.encode());
        Ok(())
    }
}

/// Load config and run one tick, folding a missing/malformed config file
/// into `(none, config_not_found)` rather than a CLI error -- the engine's
/// contract is that every tick produces exactly one `Decision`.
pub async fn run_one_tick(global: &GlobalOpts) -> Decision {
    let config = match global.load_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "config load failed");
            return Decision::none("config_not_found");
        }
    };

    let client = global.build_client();
    let engine = DecisionEngine::new(config, &client, global.state_dir.clone());
    engine.tick().await
}
