//! benchboard -- benchmark history tracking and chart generation for
//! automated test suites.
//!
//! This crate provides the core library for ingesting test-run results,
//! aggregating them into per-metric time series, rendering benchmark charts,
//! and publishing the README that displays them.

pub mod analysis;
pub mod charts;
pub mod config;
pub mod ingest;
pub mod publish;
pub mod storage;

use std::path::PathBuf;

use anyhow::Result;

use config::BenchboardConfig;

/// Outcome of a full report run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub runs: usize,
    pub charts: Vec<PathBuf>,
    pub readme: PathBuf,
}

/// Run the full pipeline: load the run history, aggregate the tracked
/// metrics, render all charts, then regenerate the README.
///
/// Charts are rendered in memory first and written only once all of them
/// succeed; the README is touched last. Any failure along the way surfaces
/// to the caller with nothing partially published.
pub fn run_report(config: &BenchboardConfig) -> Result<ReportOutcome> {
    let db_path = config.storage.db_path.display().to_string();
    tracing::info!(%db_path, "Loading run history");
    let pool = storage::open_pool(&db_path)?;
    let runs = storage::query_runs(&pool, None, None)?;
    tracing::info!(runs = runs.len(), "run history loaded");

    let series = analysis::aggregator::aggregate(&runs);

    let theme = charts::theme::Theme::sized(config.charts.width, config.charts.height);
    let mut artifacts = charts::render_all(
        &series,
        &theme,
        &config.charts.output_dir,
        Some(config.charts.pass_rate_target),
    )?;
    charts::write_artifacts(&mut artifacts)?;

    publish::publish_readme(
        &config.publish.readme_path,
        &config.publish.title,
        &runs,
        &series,
        &artifacts,
    )?;

    Ok(ReportOutcome {
        runs: runs.len(),
        charts: artifacts.into_iter().map(|a| a.path).collect(),
        readme: config.publish.readme_path.clone(),
    })
}
