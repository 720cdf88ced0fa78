//! Benchmark run ingestion -- Allure result directories to run records.

pub mod allure;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("test-cases directory not found in {dir}")]
    MissingTestCases { dir: String },

    #[error("no test results found in {dir}")]
    NoResults { dir: String },

    #[error("{field} is negative ({value}) in {file}")]
    NegativeCount {
        field: &'static str,
        value: i64,
        file: String,
    },
}

/// Per-test verdict as reported by the test runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Broken,
    Skipped,
    Unknown,
}

impl TestStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "passed" => TestStatus::Passed,
            "failed" => TestStatus::Failed,
            "broken" => TestStatus::Broken,
            "skipped" => TestStatus::Skipped,
            _ => TestStatus::Unknown,
        }
    }
}

/// Load-time statistics for one screen within a run, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenTiming {
    pub screen: String,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    /// Raw per-iteration samples, kept for recomputing stats from history.
    pub samples: Vec<f64>,
}

/// One historical test-suite execution's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Commit hash the suite ran against.
    pub run_id: String,
    /// When the suite ran (UTC). Strictly increasing across stored runs.
    pub timestamp: DateTime<Utc>,
    pub passed: u32,
    pub failed: u32,
    pub broken: u32,
    pub skipped: u32,
    pub unknown: u32,
    pub total_duration_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub total_retries: u32,
    /// Number of tests flagged flaky in this run.
    pub flaky_tests: u32,
    /// Names of the flaky tests, sorted and deduplicated.
    pub flaky_test_ids: Vec<String>,
    /// Per-screen load-time stats, sorted by screen name.
    pub screens: Vec<ScreenTiming>,
}

impl RunRecord {
    pub fn total_tests(&self) -> u32 {
        self.passed + self.failed + self.broken + self.skipped + self.unknown
    }

    /// Tests that ran to a verdict: passed + failed.
    pub fn executed(&self) -> u32 {
        self.passed + self.failed
    }

    /// Pass rate as a fraction of executed tests. None when nothing executed.
    pub fn pass_rate(&self) -> Option<f64> {
        let executed = self.executed();
        if executed == 0 {
            None
        } else {
            Some(f64::from(self.passed) / f64::from(executed))
        }
    }

    pub fn screen(&self, name: &str) -> Option<&ScreenTiming> {
        self.screens.iter().find(|s| s.screen == name)
    }
}

/// Parse one Allure benchmark directory (`test-cases/` plus `attachments/`)
/// into a RunRecord. Unparseable test-case files are skipped with a warning,
/// matching the upstream collector's behavior.
pub fn ingest_dir(dir: &Path, run_id: &str, timestamp: DateTime<Utc>) -> Result<RunRecord> {
    let test_cases = dir.join("test-cases");
    if !test_cases.is_dir() {
        anyhow::bail!(IngestError::MissingTestCases {
            dir: dir.display().to_string(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&test_cases)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    tracing::info!(dir = %dir.display(), files = files.len(), "ingesting benchmark run");

    let mut record = RunRecord {
        run_id: run_id.to_string(),
        timestamp,
        passed: 0,
        failed: 0,
        broken: 0,
        skipped: 0,
        unknown: 0,
        total_duration_ms: 0,
        min_duration_ms: u64::MAX,
        max_duration_ms: 0,
        avg_duration_ms: 0.0,
        total_retries: 0,
        flaky_tests: 0,
        flaky_test_ids: Vec::new(),
        screens: Vec::new(),
    };

    let mut flaky_ids = BTreeSet::new();
    // Per screen: raw samples plus any reported per-attachment averages.
    let mut screens: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    let mut parsed = 0u32;

    for file in &files {
        let (outcome, performance) = match allure::parse_test_case(file, dir) {
            Ok(case) => case,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "skipping unparseable test case");
                continue;
            }
        };

        parsed += 1;
        match outcome.status {
            TestStatus::Passed => record.passed += 1,
            TestStatus::Failed => record.failed += 1,
            TestStatus::Broken => record.broken += 1,
            TestStatus::Skipped => record.skipped += 1,
            TestStatus::Unknown => record.unknown += 1,
        }
        record.total_duration_ms += outcome.duration_ms;
        record.min_duration_ms = record.min_duration_ms.min(outcome.duration_ms);
        record.max_duration_ms = record.max_duration_ms.max(outcome.duration_ms);
        record.total_retries += outcome.retries;
        if outcome.flaky {
            record.flaky_tests += 1;
            flaky_ids.insert(outcome.name.clone());
        }

        if let Some((screen, times)) = performance {
            // Attachment times are in seconds; the record keeps milliseconds.
            let entry = screens.entry(screen).or_default();
            entry.1.push(times.mean() * 1000.0);
            entry.0.extend(times.samples.iter().map(|s| s * 1000.0));
        }
    }

    if parsed == 0 {
        anyhow::bail!(IngestError::NoResults {
            dir: dir.display().to_string(),
        });
    }

    if record.min_duration_ms == u64::MAX {
        record.min_duration_ms = 0;
    }
    record.avg_duration_ms =
        round2(record.total_duration_ms as f64 / f64::from(parsed));
    record.flaky_test_ids = flaky_ids.into_iter().collect();
    record.screens = screens
        .into_iter()
        .filter(|(_, (samples, _))| !samples.is_empty())
        .map(|(screen, (samples, averages))| {
            let min_ms = samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max_ms = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            // Mean of the runner-reported averages, one per attachment.
            let avg_ms = averages.iter().sum::<f64>() / averages.len() as f64;
            ScreenTiming {
                screen,
                min_ms,
                max_ms,
                avg_ms,
                samples,
            }
        })
        .collect();

    tracing::info!(
        run_id = %record.run_id,
        tests = record.total_tests(),
        passed = record.passed,
        failed = record.failed,
        screens = record.screens.len(),
        "benchmark run ingested"
    );

    Ok(record)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
