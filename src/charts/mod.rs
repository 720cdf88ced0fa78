//! Chart rendering -- aggregated series to PNG artifacts.
//!
//! Rendering is two-phase: [`render_all`] produces every chart in memory and
//! fails without touching the filesystem if any metric cannot be drawn;
//! [`write_artifacts`] then writes the complete set. The README publisher
//! runs only after both phases succeed.

pub mod raster;
pub mod svg;
pub mod theme;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::analysis::aggregator::MetricSeries;
use crate::analysis::Metric;
use theme::Theme;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no data points to render for {metric}")]
    EmptySeries { metric: String },

    #[error("SVG parse failed: {0}")]
    Svg(String),

    #[error("pixmap allocation failed for {width}x{height}")]
    Pixmap { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A rendered chart and its destination path.
#[derive(Debug)]
pub struct ChartArtifact {
    pub metric: Metric,
    pub path: PathBuf,
    pub png: Vec<u8>,
    /// Set once the artifact has been written to disk.
    pub rendered_at: Option<DateTime<Utc>>,
}

/// Render every tracked metric to memory. Nothing is written here.
pub fn render_all(
    series: &MetricSeries,
    theme: &Theme,
    output_dir: &Path,
    pass_rate_target: Option<f64>,
) -> Result<Vec<ChartArtifact>, ChartError> {
    let mut artifacts = Vec::with_capacity(Metric::ALL.len());

    for metric in Metric::ALL {
        let target = match metric {
            Metric::PassRate => pass_rate_target,
            _ => None,
        };
        let markup = svg::render_svg(metric, series.get(metric), target, theme)?;
        let png = raster::rasterize(&markup, theme.width, theme.height)?;
        tracing::debug!(metric = %metric, bytes = png.len(), "chart rendered");

        artifacts.push(ChartArtifact {
            metric,
            path: output_dir.join(metric.file_name()),
            png,
            rendered_at: None,
        });
    }

    Ok(artifacts)
}

/// Write all rendered artifacts to their output paths, stamping each one.
/// Re-rendering identical input data overwrites with identical bytes.
pub fn write_artifacts(artifacts: &mut [ChartArtifact]) -> Result<(), ChartError> {
    for artifact in artifacts.iter_mut() {
        if let Some(parent) = artifact.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&artifact.path, &artifact.png)?;
        artifact.rendered_at = Some(Utc::now());
        tracing::info!(metric = %artifact.metric, path = %artifact.path.display(), "chart written");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::aggregate;
    use crate::ingest::RunRecord;
    use chrono::TimeZone;

    fn run(secs: i64) -> RunRecord {
        RunRecord {
            run_id: format!("run-{secs}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            passed: 9,
            failed: 1,
            broken: 0,
            skipped: 0,
            unknown: 0,
            total_duration_ms: 60_000,
            min_duration_ms: 100,
            max_duration_ms: 9_000,
            avg_duration_ms: 6_000.0,
            total_retries: 1,
            flaky_tests: 0,
            flaky_test_ids: Vec::new(),
            screens: vec![
                crate::ingest::ScreenTiming {
                    screen: "swap".into(),
                    min_ms: 700.0,
                    max_ms: 1100.0,
                    avg_ms: 900.0,
                    samples: vec![700.0, 900.0, 1100.0],
                },
                crate::ingest::ScreenTiming {
                    screen: "wallet".into(),
                    min_ms: 500.0,
                    max_ms: 800.0,
                    avg_ms: 650.0,
                    samples: vec![500.0, 800.0],
                },
            ],
        }
    }

    #[test]
    fn test_render_all_produces_six_artifacts() {
        let series = aggregate(&[run(100), run(200)]);
        let theme = Theme::sized(400, 200);
        let dir = tempfile::TempDir::new().unwrap();

        let mut artifacts =
            render_all(&series, &theme, dir.path(), Some(100.0)).unwrap();
        assert_eq!(artifacts.len(), 6);
        assert!(artifacts.iter().all(|a| a.rendered_at.is_none()));

        write_artifacts(&mut artifacts).unwrap();
        for artifact in &artifacts {
            assert!(artifact.path.exists(), "{}", artifact.path.display());
            assert!(artifact.rendered_at.is_some());
        }
    }

    #[test]
    fn test_empty_history_renders_nothing() {
        let series = aggregate(&[]);
        let theme = Theme::sized(400, 200);
        let dir = tempfile::TempDir::new().unwrap();

        let err = render_all(&series, &theme, dir.path(), Some(100.0)).unwrap_err();
        assert!(matches!(err, ChartError::EmptySeries { .. }));

        // Two-phase contract: the failed render left no files behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rerender_is_byte_identical() {
        let series = aggregate(&[run(100), run(200), run(300)]);
        let theme = Theme::sized(400, 200);
        let dir = tempfile::TempDir::new().unwrap();

        let first = render_all(&series, &theme, dir.path(), Some(100.0)).unwrap();
        let second = render_all(&series, &theme, dir.path(), Some(100.0)).unwrap();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.png, b.png, "{}", a.metric);
        }
    }
}
