//! linkscore replay
//!
//! Runs a telemetry trace through a scorer and prints one JSON line per
//! sample with the score result. The trace is either a built-in scenario or
//! a JSON-lines file of telemetry samples.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use linkscore::model::ModelBundle;
use linkscore::{ConnectedScorer, Scorer, ScorerConfig, TelemetrySample};
use linkscore_sim::link_scenarios::{
    BusyWeakScenario, IdleWeakScenario, RoamScenario, StableLinkScenario, WalkAwayScenario,
};
use linkscore_sim::scenario::{Scenario, ScenarioConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScenarioName {
    Stable,
    WalkAway,
    IdleWeak,
    BusyWeak,
    Roam,
    Random,
}

/// Replay telemetry through a link-quality scorer.
#[derive(Parser, Debug)]
#[command(name = "linkscore-replay", about = "Replay telemetry through a link scorer")]
struct Cli {
    /// Scorer configuration (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model bundle (JSON) for the ML scorer.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Built-in scenario to replay.
    #[arg(long, value_enum, default_value = "walk-away")]
    scenario: ScenarioName,

    /// Seed for the random scenario.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// JSON-lines telemetry file; overrides `--scenario`.
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Score every sample as a secondary link.
    #[arg(long, default_value_t = false)]
    secondary: bool,
}

fn scenario_samples(name: ScenarioName, seed: u64) -> Vec<TelemetrySample> {
    match name {
        ScenarioName::Stable => StableLinkScenario::default().samples(),
        ScenarioName::WalkAway => WalkAwayScenario::default().samples(),
        ScenarioName::IdleWeak => IdleWeakScenario::default().samples(),
        ScenarioName::BusyWeak => BusyWeakScenario::default().samples(),
        ScenarioName::Roam => RoamScenario::default().samples(),
        ScenarioName::Random => Scenario::new(ScenarioConfig {
            seed,
            ..Default::default()
        })
        .samples(),
    }
}

fn read_trace(path: &Path) -> anyhow::Result<Vec<TelemetrySample>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening trace {}", path.display()))?;
    let mut samples = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid sample", path.display(), lineno + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => ScorerConfig::from_toml_file(path)?,
        None => ScorerConfig::default(),
    };
    let bundle = cli
        .model
        .as_ref()
        .map(ModelBundle::from_json_file)
        .transpose()?;
    let mut scorer = Scorer::from_config(&cfg, bundle.as_ref());

    let samples = match &cli.trace {
        Some(path) => read_trace(path)?,
        None => scenario_samples(cli.scenario, cli.seed),
    };
    tracing::info!(
        scorer = scorer.name(),
        samples = samples.len(),
        "replay starting"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for sample in &samples {
        let result = scorer.generate_score_result(sample, sample.timestamp_ms, !cli.secondary);
        let line = serde_json::json!({
            "timestamp_ms": sample.timestamp_ms,
            "link": sample.identity.to_string(),
            "rssi_dbm": sample.rssi_dbm,
            "result": result,
        });
        writeln!(out, "{line}")?;
    }
    Ok(())
}
