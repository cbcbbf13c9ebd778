use std::io::Read;
use std::path::{Path, PathBuf};

use analysis_core::{RiskDecision, UnifiedAnalysis};
use analysis_orchestrator::{AnalysisOrchestrator, EngineConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fundamental_analysis::FundamentalAnalysisEngine;
use risk_manager::RiskSizer;
use sentiment_analysis::Lexicon;
use serde::Serialize;

mod config;
mod request;

use request::EvaluationRequest;

#[derive(Parser)]
#[command(name = "signal-cli", about = "Composite signal scoring and risk sizing")]
struct Cli {
    /// JSON engine configuration. Environment variables are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an asset and size a position from a JSON request.
    Evaluate {
        /// Request file, or `-` for stdin.
        #[arg(default_value = "-")]
        request: PathBuf,

        /// Emit every pillar's output, not just the decision.
        #[arg(long, default_value_t = false)]
        detailed: bool,
    },
    /// Check a live price against a previously emitted decision's alert levels.
    Check {
        /// Decision JSON file (output of `evaluate`).
        decision: PathBuf,

        #[arg(long)]
        price: f64,
    },
    /// Score a headline with the sentiment lexicon.
    Headline {
        text: String,

        #[arg(long, default_value = "news")]
        source: String,
    },
    /// Print the effective engine configuration.
    Config,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Evaluate { .. } => "evaluate",
            Commands::Check { .. } => "check",
            Commands::Headline { .. } => "headline",
            Commands::Config => "config",
        }
    }
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    // Logs go to stderr so stdout stays parseable JSON
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn config_source(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("file {}", path.display()),
        None => "environment".to_string(),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => config::from_file(path),
        None => config::from_env(),
    }
}

fn evaluate(config: &EngineConfig, request_path: &Path, detailed: bool, pretty: bool) -> Result<()> {
    let orchestrator = AnalysisOrchestrator::from_config(config).context("invalid engine configuration")?;
    let fundamental_engine = FundamentalAnalysisEngine::with_config(config.fundamental.clone())?;

    let raw = read_input(request_path)?;
    let request: EvaluationRequest = serde_json::from_str(&raw).context("parsing evaluation request")?;
    let as_of = request.as_of();
    let metrics = request.fundamental_metrics(&fundamental_engine);
    let items = request.sentiment_items(&Lexicon::new());

    tracing::debug!(
        "{}: {} bars, {} sentiment items after headline scoring",
        request.asset_id,
        request.price_history.len(),
        items.len()
    );

    let analysis: UnifiedAnalysis = orchestrator
        .evaluate_detailed(&request.asset_id, &request.price_history, &metrics, &items, as_of)
        .with_context(|| format!("evaluating {}", request.asset_id))?;

    if detailed {
        print_json(&analysis, pretty)
    } else {
        print_json(&analysis.decision, pretty)
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    tracing::info!("signal-cli {} starting `{}`", env!("CARGO_PKG_VERSION"), cli.command.name());

    let config = load_config(cli.config.as_deref())?;
    tracing::info!(
        "Configuration loaded from {} (weights {:.2}/{:.2}/{:.2}, max risk {:.2}% of {:.0})",
        config_source(cli.config.as_deref()),
        config.weights.technical,
        config.weights.fundamental,
        config.weights.sentiment,
        config.risk.max_risk_per_trade * 100.0,
        config.risk.account_equity
    );

    match cli.command {
        Commands::Evaluate { request, detailed } => evaluate(&config, &request, detailed, cli.pretty)?,
        Commands::Check { decision, price } => {
            let raw = read_input(&decision)?;
            let decision: RiskDecision = serde_json::from_str(&raw).context("parsing decision")?;
            print_json(&RiskSizer::check_price(&decision, price), cli.pretty)?;
        }
        Commands::Headline { text, source } => {
            let item = Lexicon::new().headline_item(&source, Utc::now(), &text);
            print_json(&item, cli.pretty)?;
        }
        Commands::Config => print_json(&config, cli.pretty)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        let cli = Cli::try_parse_from(["signal-cli", "evaluate", "req.json", "--detailed"]).unwrap();
        assert_eq!(cli.command.name(), "evaluate");

        let cli = Cli::try_parse_from(["signal-cli", "--pretty", "check", "d.json", "--price", "48.5"]).unwrap();
        assert_eq!(cli.command.name(), "check");
        assert!(cli.pretty);

        let cli = Cli::try_parse_from(["signal-cli", "config", "--config", "engine.json"]).unwrap();
        assert_eq!(cli.command.name(), "config");
        assert_eq!(config_source(cli.config.as_deref()), "file engine.json");
    }

    #[test]
    fn test_config_source_defaults_to_environment() {
        let cli = Cli::try_parse_from(["signal-cli", "headline", "Shares surge"]).unwrap();
        assert_eq!(cli.command.name(), "headline");
        assert_eq!(config_source(cli.config.as_deref()), "environment");
    }
}
