//! Turnkeeper - replay a conversation scenario and print the decision trace

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnkeeper::scenario::{Scenario, ScenarioRunner};
use turnkeeper::LexiconConfig;

#[derive(Parser)]
#[command(name = "turnkeeper")]
#[command(about = "Replay a turn-taking scenario against a simulated session")]
struct Cli {
    /// Scenario TOML file
    scenario: PathBuf,

    /// Lexicon TOML file overriding the default word lists
    #[arg(long)]
    lexicon: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr so the JSON report stays clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnkeeper=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("Starting turnkeeper scenario runner");

    let scenario = Scenario::load(&cli.scenario)?;
    let mut runner = ScenarioRunner::new(scenario);
    if let Some(path) = &cli.lexicon {
        runner = runner.with_lexicon(LexiconConfig::load(path)?);
    }

    let report = runner.run()?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}
