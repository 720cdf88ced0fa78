//! README publishing -- regenerate the benchmark report document.
//!
//! The README is replaced atomically: the new document is rendered to a
//! temporary file next to the target and renamed over it, so a failure at
//! any point leaves the previous document intact.

pub mod csv;

use std::fs;
use std::path::{Path, PathBuf};

use askama::Template;
use thiserror::Error;

use crate::analysis::aggregator::MetricSeries;
use crate::analysis::{stats, Metric};
use crate::charts::ChartArtifact;
use crate::ingest::RunRecord;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to render README template: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Template)]
#[template(path = "readme.md")]
struct ReadmeTemplate<'a> {
    title: &'a str,
    run_count: usize,
    latest: Option<LatestRun>,
    sections: Vec<Section>,
}

struct LatestRun {
    commit: String,
    date: String,
}

struct Section {
    heading: &'static str,
    image: String,
    summary: String,
}

/// Rewrite the README so it references the current chart artifacts.
///
/// Callers invoke this only after every artifact has been rendered and
/// written; a missing chart upstream aborts the whole pipeline instead.
pub fn publish_readme(
    readme_path: &Path,
    title: &str,
    runs: &[RunRecord],
    series: &MetricSeries,
    artifacts: &[ChartArtifact],
) -> Result<(), PublishError> {
    let latest = runs.last().map(|run| LatestRun {
        commit: run.run_id.clone(),
        date: run.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
    });

    let sections = artifacts
        .iter()
        .map(|artifact| Section {
            heading: artifact.metric.title(),
            image: image_reference(readme_path, &artifact.path),
            summary: metric_summary(artifact.metric, series),
        })
        .collect();

    let document = ReadmeTemplate {
        title,
        run_count: runs.len(),
        latest,
        sections,
    }
    .render()?;

    write_atomic(readme_path, &document)?;
    tracing::info!(path = %readme_path.display(), "README published");
    Ok(())
}

/// Image path as referenced from the README: relative to the README's
/// directory when the artifact lives beneath it.
fn image_reference(readme_path: &Path, artifact_path: &Path) -> String {
    let base = readme_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty());

    let relative = match base {
        Some(base) => artifact_path.strip_prefix(base).unwrap_or(artifact_path),
        None => artifact_path,
    };

    relative.display().to_string()
}

fn metric_summary(metric: Metric, series: &MetricSeries) -> String {
    match stats::summarize(series.get(metric)) {
        Some(summary) => {
            let unit = metric.unit();
            let sep = if unit.is_empty() { "" } else { " " };
            format!(
                "Latest: {latest:.2}{sep}{unit} (mean {mean:.2}, min {min:.2}, max {max:.2} over {n} runs)",
                latest = metric.display_value(summary.latest),
                mean = metric.display_value(summary.mean),
                min = metric.display_value(summary.min),
                max = metric.display_value(summary.max),
                n = summary.samples,
            )
        }
        None => "No data recorded yet.".to_string(),
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), PublishError> {
    let tmp: PathBuf = path.with_extension("md.tmp");

    fs::write(&tmp, content).map_err(|source| PublishError::Io {
        path: tmp.display().to_string(),
        source,
    })?;

    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PublishError::Io {
            path: path.display().to_string(),
            source,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::aggregate;
    use chrono::{TimeZone, Utc};

    fn run(secs: i64) -> RunRecord {
        RunRecord {
            run_id: format!("c0ffee{secs}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            passed: 9,
            failed: 1,
            broken: 0,
            skipped: 0,
            unknown: 0,
            total_duration_ms: 120_000,
            min_duration_ms: 100,
            max_duration_ms: 8_000,
            avg_duration_ms: 12_000.0,
            total_retries: 2,
            flaky_tests: 1,
            flaky_test_ids: vec!["test_send".into()],
            screens: Vec::new(),
        }
    }

    fn artifacts(dir: &Path) -> Vec<ChartArtifact> {
        Metric::ALL
            .iter()
            .map(|&metric| ChartArtifact {
                metric,
                path: dir.join("docs").join(metric.file_name()),
                png: Vec::new(),
                rendered_at: None,
            })
            .collect()
    }

    #[test]
    fn test_publish_writes_all_sections() {
        let dir = tempfile::TempDir::new().unwrap();
        let readme = dir.path().join("README.md");
        let runs = vec![run(100), run(200)];
        let series = aggregate(&runs);

        publish_readme(
            &readme,
            "Test Suite Benchmarks",
            &runs,
            &series,
            &artifacts(dir.path()),
        )
        .unwrap();

        let content = fs::read_to_string(&readme).unwrap();
        assert!(content.starts_with("# Test Suite Benchmarks"));
        assert!(content.contains("## Pass Rate Trend"));
        assert!(content.contains("(docs/pass_rate_trend.png)"));
        assert!(content.contains("(docs/swap_loading_time.png)"));
        assert!(content.contains("(docs/flaky_tests.png)"));
        assert!(content.contains("`c0ffee200`"));
        assert!(content.contains("2 recorded runs"));
        // Pass rate summary is displayed in percent.
        assert!(content.contains("Latest: 90.00 %"));
        // No chart ever rendered for the screens: the section still exists.
        assert!(content.contains("No data recorded yet."));
    }

    #[test]
    fn test_publish_replaces_previous_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let readme = dir.path().join("README.md");
        fs::write(&readme, "# Stale\n").unwrap();

        let runs = vec![run(100)];
        let series = aggregate(&runs);
        publish_readme(&readme, "Fresh", &runs, &series, &artifacts(dir.path())).unwrap();

        let content = fs::read_to_string(&readme).unwrap();
        assert!(content.starts_with("# Fresh"));
        assert!(!content.contains("Stale"));
        // The temp file was cleaned up by the rename.
        assert!(!dir.path().join("README.md.tmp").exists());
    }

    #[test]
    fn test_publish_failure_leaves_no_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let readme = dir.path().join("missing").join("README.md");

        let runs = vec![run(100)];
        let series = aggregate(&runs);
        let err = publish_readme(&readme, "T", &runs, &series, &artifacts(dir.path())).unwrap_err();

        assert!(matches!(err, PublishError::Io { .. }));
        assert!(!readme.exists());
    }

    #[test]
    fn test_image_reference_is_relative_to_readme() {
        let readme = Path::new("/work/README.md");
        let artifact = Path::new("/work/docs/retry_count.png");
        assert_eq!(image_reference(readme, artifact), "docs/retry_count.png");

        // Artifact outside the README directory keeps its full path.
        let outside = Path::new("/elsewhere/retry_count.png");
        assert_eq!(image_reference(readme, outside), "/elsewhere/retry_count.png");
    }

    #[test]
    fn test_empty_history_summary() {
        let series = aggregate(&[]);
        assert_eq!(
            metric_summary(Metric::PassRate, &series),
            "No data recorded yet."
        );
    }
}
