//! Principal CLI - outer driver for the Principal decision engine
//!
//! This binary is deliberately thin: it loads configuration, builds the
//! `gh`-backed platform client, runs the decision engine for one or more
//! ticks, and hands the result to the operator's own hook command. The
//! business logic -- implementing issues, reviewing pull requests, merging
//! -- is never performed here.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ConfigArgs, RunArgs, TickArgs};

#[derive(Parser, Debug)]
#[command(name = "principal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run exactly one decision tick and print it as `KEY=VALUE` lines
    Tick(TickArgs),

    /// Loop the decision engine, dispatching a hook command per tick
    Run(RunArgs),

    /// Print the effective configuration after all overrides
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tick(args) => args.execute().await,
        Commands::Run(args) => args.execute().await,
        Commands::Config(args) => args.execute().await,
    }
}
