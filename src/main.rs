use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "benchboard",
    about = "Benchmark history tracking and chart generation for automated test suites",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a benchboard.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one Allure benchmark run into the history
    Ingest {
        /// Benchmark directory containing test-cases/ and attachments/
        benchmark_dir: PathBuf,

        /// Git commit hash the suite ran against (e.g. a1b2c3d)
        #[arg(long)]
        commit_hash: String,

        /// Run datetime in YYYY-MM-DDTHH:MM:SS format, interpreted as UTC
        #[arg(long)]
        date: String,
    },

    /// Aggregate the history, render all charts, and regenerate the README
    Report,

    /// Inspect the stored run history
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List stored runs
    List,

    /// Export summary metrics as CSV
    Export {
        /// Output file path
        #[arg(long, default_value = "summary_metrics.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => benchboard::config::BenchboardConfig::load(path)?,
        None => benchboard::config::BenchboardConfig::load_or_default(),
    };

    match cli.command {
        Commands::Ingest {
            benchmark_dir,
            commit_hash,
            date,
        } => {
            let timestamp = NaiveDateTime::parse_from_str(&date, "%Y-%m-%dT%H:%M:%S")
                .with_context(|| {
                    format!("date must be in YYYY-MM-DDTHH:MM:SS format, got: {date}")
                })?
                .and_utc();

            tracing::info!(dir = %benchmark_dir.display(), %commit_hash, "Ingesting benchmark run");
            let record = benchboard::ingest::ingest_dir(&benchmark_dir, &commit_hash, timestamp)?;

            let db_path = config.storage.db_path.display().to_string();
            let pool = benchboard::storage::open_pool(&db_path)?;
            benchboard::storage::append_run(&pool, &record)?;

            println!("Processed {} tests", record.total_tests());
            if !record.screens.is_empty() {
                println!("Processed {} performance screens", record.screens.len());
            }
            match record.pass_rate() {
                Some(rate) => println!("Pass rate: {:.2}%", rate * 100.0),
                None => println!("Pass rate: n/a (no tests executed)"),
            }
            println!("Total duration: {}ms", record.total_duration_ms);
        }

        Commands::Report => {
            let outcome = benchboard::run_report(&config)?;
            println!("Aggregated {} runs", outcome.runs);
            for chart in &outcome.charts {
                println!("Generated {}", chart.display());
            }
            println!("README updated at {}", outcome.readme.display());
        }

        Commands::Runs { action } => {
            let db_path = config.storage.db_path.display().to_string();
            let pool = benchboard::storage::open_pool(&db_path)?;
            let runs = benchboard::storage::query_runs(&pool, None, None)?;

            match action {
                RunsAction::List => {
                    if runs.is_empty() {
                        println!("No runs recorded.");
                    } else {
                        println!(
                            "{:<12} | {:<20} | {:<6} | {:<9} | {:<7} | Flaky",
                            "Commit", "Date", "Tests", "Pass Rate", "Retries"
                        );
                        println!(
                            "{:-<12}-|-{:-<20}-|-{:-<6}-|-{:-<9}-|-{:-<7}-|-{:-<5}",
                            "", "", "", "", "", ""
                        );
                        for run in &runs {
                            let rate = run
                                .pass_rate()
                                .map(|r| format!("{:.1}%", r * 100.0))
                                .unwrap_or_else(|| "n/a".to_string());
                            println!(
                                "{:<12} | {:<20} | {:<6} | {:<9} | {:<7} | {}",
                                run.run_id,
                                run.timestamp.format("%Y-%m-%d %H:%M:%S"),
                                run.total_tests(),
                                rate,
                                run.total_retries,
                                run.flaky_tests
                            );
                        }
                    }
                }

                RunsAction::Export { output } => {
                    let csv = benchboard::publish::csv::build_summary_csv(&runs);
                    std::fs::write(&output, csv)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    println!("Exported {} runs to {}", runs.len(), output.display());
                }
            }
        }
    }

    Ok(())
}
