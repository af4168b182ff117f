//! `principal config` -- print the effective, post-override configuration

use super::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub global: GlobalOpts,
}

impl ConfigArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let config = self.global.load_config()?;

        println!("Principal configuration");
        println!("========================");
        println!("specs.base_path: {}", config.specs.base_path.display());
        println!("specs.active: {:?}", config.specs.active);
        println!("specs.tracking.mode: {:?}", config.specs.tracking.mode);
        println!(
            "specs.tracking.epic_issues: {:?}",
            config.specs.tracking.epic_issues
        );
        println!("github.labels.task: {}", config.github.labels.task);
        println!(
            "github.labels.in_progress: {}",
            config.github.labels.in_progress
        );
        println!("github.labels.pr_ready: {}", config.github.labels.pr_ready);
        println!(
            "escalation.max_review_attempts: {}",
            config.escalation.max_review_attempts
        );
        println!("state_dir: {}", self.global.state_dir.display());

        Ok(())
    }
}
