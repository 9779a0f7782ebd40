//! Crucible command line.
//!
//! Runs crisis scenarios against model backends, summarizes feedback logs,
//! and validates scenario and configuration files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crucible_core::{FeedbackStore, FeedbackTrends, Scenario, ScoringConfig, ThresholdTable, TrendAnalyzer};
use crucible_runtime::{BackendRegistry, RunReport, RuntimeConfig, ScenarioDriver};

#[derive(Parser)]
#[command(name = "crucible")]
#[command(about = "Stress-test language models with scripted crisis scenarios", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and write its results
    Run {
        /// Scenario file (YAML, or JSON by extension)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Runtime configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use canned responses instead of calling model APIs
        #[arg(long)]
        offline: bool,

        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Summarize trends in a feedback log
    Trends {
        /// Feedback log (feedback_<scenario>.json)
        #[arg(short, long)]
        log: PathBuf,

        /// Number of improvement areas to list
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Print the trends as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate scenario, configuration, scoring or threshold files
    Validate {
        #[arg(long)]
        scenario: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        scoring: Option<PathBuf>,

        #[arg(long)]
        thresholds: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            config,
            offline,
            out,
        } => run(&scenario, config.as_deref(), offline, out).await,
        Commands::Trends { log, top, json } => trends(&log, top, json),
        Commands::Validate {
            scenario,
            config,
            scoring,
            thresholds,
        } => validate(
            scenario.as_deref(),
            config.as_deref(),
            scoring.as_deref(),
            thresholds.as_deref(),
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

async fn run(
    scenario_path: &Path,
    config_path: Option<&Path>,
    offline: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let scenario = Scenario::from_file(scenario_path)
        .with_context(|| format!("Failed to load scenario {}", scenario_path.display()))?;

    let mut config = load_config(config_path)?;
    if let Some(out) = out {
        config.output_dir = out;
    }

    let driver = if offline {
        tracing::info!("Offline run: backends return canned responses");
        ScenarioDriver::with_backends(&config, config.offline_backends())
    } else {
        ScenarioDriver::from_config(&config, &BackendRegistry::with_defaults())
    }
    .context("Failed to set up scenario driver")?;

    let report = driver
        .run(&scenario)
        .await
        .with_context(|| format!("Scenario '{}' failed", scenario.name))?;

    let results_path = write_report(&report, driver.output_dir())?;
    print_report(&report);
    println!("\nFeedback log: {}", report.log_path.display());
    println!("Results:      {}", results_path.display());
    Ok(())
}

fn write_report(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(report.file_name());
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    Ok(path)
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, suffix),
        None => "n/a".to_string(),
    }
}

fn print_report(report: &RunReport) {
    let summary = &report.summary;
    println!("\n{} Results:", report.scenario_name);
    println!(
        "Events: {} ({} evaluated, {} context only)",
        summary.events_total, summary.events_evaluated, summary.events_context_only
    );
    println!("Average Response Time: {}", fmt_opt(summary.avg_response_time_secs, " seconds"));
    println!("Average Safety Score: {}", fmt_opt(summary.avg_safety, ""));
    println!("Average Ethical Alignment: {}", fmt_opt(summary.avg_ethics, ""));

    for (name, backend) in &summary.backends {
        println!("\n{}:", name.to_uppercase());
        println!(
            "  responses {}, failures {}, revisions {}/{} succeeded",
            backend.responses,
            backend.dispatch_failures,
            backend.revisions_succeeded,
            backend.revisions_attempted
        );
        println!(
            "  avg time {}, safety {}, ethics {}",
            fmt_opt(backend.avg_response_time_secs, "s"),
            fmt_opt(backend.avg_safety, ""),
            fmt_opt(backend.avg_ethics, "")
        );
    }
}

fn trends(log: &Path, top: usize, json: bool) -> Result<()> {
    let history = FeedbackStore::load(log)
        .with_context(|| format!("Failed to read feedback log {}", log.display()))?;
    let trends = TrendAnalyzer::new().analyze(&history);

    if json {
        println!("{}", serde_json::to_string_pretty(&trends)?);
    } else {
        print_trends(&trends, top);
    }
    Ok(())
}

fn print_trends(trends: &FeedbackTrends, top: usize) {
    println!("Records analyzed: {}", trends.records_analyzed);
    if trends.records_analyzed == 0 {
        return;
    }

    println!("\nMost common improvement areas:");
    for (area, count) in trends.top_improvement_areas(top) {
        println!("  {:<28} {}", area, count);
    }

    println!("\n  {:<28} {:>6} {:>6} {:>8}", "metric", "mean", "std", "slope");
    for (metric, trend) in &trends.metric_trends {
        let slope = trend
            .slope
            .map(|s| format!("{:+.3}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<28} {:>6.3} {:>6.3} {:>8}",
            metric, trend.mean, trend.std_dev, slope
        );
    }
}

fn validate(
    scenario: Option<&Path>,
    config: Option<&Path>,
    scoring: Option<&Path>,
    thresholds: Option<&Path>,
) -> Result<()> {
    if scenario.is_none() && config.is_none() && scoring.is_none() && thresholds.is_none() {
        bail!("Nothing to validate: pass --scenario, --config, --scoring or --thresholds");
    }

    if let Some(path) = scenario {
        let scenario = Scenario::from_file(path)
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        println!(
            "{}: ok ({} events, {} requiring action)",
            path.display(),
            scenario.events.len(),
            scenario.actionable_events()
        );
    }

    if let Some(path) = config {
        let config = load_config(Some(path))?;
        let registry = BackendRegistry::with_defaults();
        for backend in &config.backends {
            match registry.validate(&backend.provider, &backend.settings) {
                Ok(()) => println!("  backend {}: ok ({})", backend.name, backend.provider),
                Err(e) => println!("  backend {}: {}", backend.name, e),
            }
        }
        config
            .validate_backends(&registry)
            .with_context(|| format!("Invalid backends in {}", path.display()))?;
        println!("{}: ok ({} backends)", path.display(), config.backends.len());
    }

    if let Some(path) = scoring {
        ScoringConfig::from_yaml_file(path)
            .with_context(|| format!("Invalid scoring config {}", path.display()))?;
        println!("{}: ok", path.display());
    }

    if let Some(path) = thresholds {
        ThresholdTable::from_yaml_file(path)
            .with_context(|| format!("Invalid threshold table {}", path.display()))?;
        println!("{}: ok", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "crucible",
            "run",
            "--scenario",
            "scenarios/earthquake_response.yaml",
            "--offline",
            "-v",
        ]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run { offline: true, .. }));
    }

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(Some(1.234), " seconds"), "1.23 seconds");
        assert_eq!(fmt_opt(None, "s"), "n/a");
    }
}
