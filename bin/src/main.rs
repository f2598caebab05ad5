//! CLI for fd-var.
//!
//! Builds the feature table from two CSV inputs, forecasts VaR with every
//! registered model, backtests the forecasts and writes the result tables.

use clap::{Parser, Subcommand};
use fd_var::{
    ModelRegistry, ResultsLayout, RunReport, VarConfig, load_features, output::write_features,
    run_pipeline, write_report,
};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fd-var")]
#[command(about = "Rolling-window VaR forecasting and Kupiec backtesting", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: features, forecasts, backtests, comparison
    Run {
        /// Asset price CSV
        #[arg(long)]
        prices: PathBuf,
        /// Volatility index CSV
        #[arg(long)]
        vol_index: PathBuf,
        /// Results directory
        #[arg(long, default_value = "results")]
        output: PathBuf,
    },
    /// Build and write the feature table only
    Features {
        /// Asset price CSV
        #[arg(long)]
        prices: PathBuf,
        /// Volatility index CSV
        #[arg(long)]
        vol_index: PathBuf,
        /// Results directory
        #[arg(long, default_value = "results")]
        output: PathBuf,
    },
    /// List registered models
    Models,
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "run aborted");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Install the log subscriber. `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn execute(cli: Cli) -> fd_var::Result<()> {
    let config = match &cli.config {
        Some(path) => VarConfig::from_file(path)?,
        None => VarConfig::default(),
    };

    match cli.command {
        Commands::Run {
            prices,
            vol_index,
            output,
        } => {
            let (features, quality) = load_features(&prices, &vol_index, &config)?;
            let registry = ModelRegistry::with_defaults(&config)?;
            let report = run_pipeline(&features, quality, &registry, &config)?;
            write_report(&ResultsLayout::new(&output), &config, &features, &report)?;
            print_summary(&report);
            println!("\nResults written to {}", output.display());
        }
        Commands::Features {
            prices,
            vol_index,
            output,
        } => {
            let (features, quality) = load_features(&prices, &vol_index, &config)?;
            let path = write_features(&ResultsLayout::new(&output), &features)?;
            println!("{} feature records written to {}", features.len(), path.display());
            if let Some((first, last)) = features.date_range() {
                println!("Date range: {first} to {last}");
            }
            if quality.total() > 0 {
                println!("Data quality findings: {}", quality.total());
            }
        }
        Commands::Models => list_models(&ModelRegistry::with_defaults(&config)?),
        Commands::Config => println!("{}", config.to_toml()?),
    }
    Ok(())
}

/// List registered models with their inputs.
fn list_models(registry: &ModelRegistry) {
    println!("Available Models ({} total)\n", registry.len());
    for model in registry.iter() {
        println!("  {} - {}", model.name(), model.description());
        println!("    columns: {}", model.required_columns().join(", "));
    }
}

/// Per-model totals, rejection counts and the best model in each group.
fn print_summary(report: &RunReport) {
    println!("Model Summary");
    println!(
        "  {:<14} {:>6} {:>8} {:>10} {:>10} {:>9} {:>9}",
        "model", "tests", "rejects", "violations", "expected", "rate", "avg rank"
    );
    for s in &report.summaries {
        println!(
            "  {:<14} {:>6} {:>8} {:>10} {:>10.1} {:>8.2}% {:>9.2}",
            s.model,
            s.tests,
            s.rejections,
            s.total_violations,
            s.total_expected,
            s.violation_rate * 100.0,
            s.average_rank
        );
    }

    println!("\nBest Model per Window and Confidence Level");
    for best in fd_var::backtest::best_models(&report.rankings) {
        println!(
            "  {:<5} {:>5.1}%  {:<14} (|deviation| = {:.2})",
            best.window,
            best.confidence_level * 100.0,
            best.model,
            best.abs_deviation
        );
    }

    let skipped: usize = report
        .forecasts
        .iter()
        .flat_map(|f| &f.series)
        .map(|s| s.skipped.total())
        .sum();
    if skipped > 0 || report.quality.total() > 0 {
        println!(
            "\nSkipped forecast points: {skipped}; data quality findings: {}",
            report.quality.total()
        );
    }
}
