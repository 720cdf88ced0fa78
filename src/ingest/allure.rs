//! Allure test-case JSON decoding and load-time attachment parsing.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{IngestError, TestStatus};

/// Raw Allure test-case document, reduced to the fields the benchmark needs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub time: TestTime,
    #[serde(default)]
    pub retries_count: i64,
    #[serde(default)]
    pub flaky: bool,
    #[serde(default)]
    pub test_stage: TestStage,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestTime {
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestStage {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
}

/// Outcome of one test case within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub retries: u32,
    pub flaky: bool,
}

/// Load-time samples parsed from a performance attachment, in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadTimes {
    pub samples: Vec<f64>,
    pub average: Option<f64>,
}

impl LoadTimes {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean load time: the reported average when present, otherwise the
    /// arithmetic mean of the individual samples.
    pub fn mean(&self) -> f64 {
        match self.average {
            Some(avg) => avg,
            None => self.samples.iter().sum::<f64>() / self.samples.len() as f64,
        }
    }
}

/// Parse one test-case JSON file. Returns the outcome and, for loading-time
/// tests with a parseable attachment, the screen name and its samples.
pub fn parse_test_case(
    path: &Path,
    benchmark_dir: &Path,
) -> Result<(TestOutcome, Option<(String, LoadTimes)>)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read test case: {}", path.display()))?;
    let case: TestCase = serde_json::from_str(&content)
        .with_context(|| format!("failed to decode test case: {}", path.display()))?;

    let outcome = decode_outcome(&case, path)?;

    let mut performance = None;
    if let Some(screen) = screen_name(&case.name) {
        if let Some(source) = performance_attachment(&case) {
            let attachment_path = benchmark_dir.join("attachments").join(source);
            match fs::read_to_string(&attachment_path) {
                Ok(text) => {
                    let times = parse_load_times(&text);
                    if !times.is_empty() {
                        performance = Some((screen, times));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        attachment = %attachment_path.display(),
                        error = %e,
                        "failed to read performance attachment"
                    );
                }
            }
        }
    }

    Ok((outcome, performance))
}

fn decode_outcome(case: &TestCase, path: &Path) -> Result<TestOutcome> {
    if case.time.duration < 0 {
        return Err(IngestError::NegativeCount {
            field: "duration",
            value: case.time.duration,
            file: path.display().to_string(),
        }
        .into());
    }
    if case.retries_count < 0 {
        return Err(IngestError::NegativeCount {
            field: "retriesCount",
            value: case.retries_count,
            file: path.display().to_string(),
        }
        .into());
    }

    Ok(TestOutcome {
        name: case.name.clone(),
        status: TestStatus::parse(&case.status),
        duration_ms: case.time.duration as u64,
        retries: case.retries_count as u32,
        flaky: case.flaky,
    })
}

/// Find the attachment source that carries load-time samples: first on the
/// test stage itself, then on its steps.
pub fn performance_attachment(case: &TestCase) -> Option<&str> {
    let matches = |a: &Attachment| a.name.to_lowercase().contains("load time") && !a.source.is_empty();

    if let Some(a) = case.test_stage.attachments.iter().find(|a| matches(a)) {
        return Some(&a.source);
    }
    case.test_stage
        .steps
        .iter()
        .flat_map(|s| s.attachments.iter())
        .find(|a| matches(a))
        .map(|a| a.source.as_str())
}

/// Parse a load-time attachment body.
///
/// Sample lines look like `Run 3 load time: 1.42 s`; the summary line looks
/// like `Average load time: 1.38 s` and feeds the mean, not the samples.
pub fn parse_load_times(content: &str) -> LoadTimes {
    let mut times = LoadTimes::default();

    for line in content.lines() {
        let lower = line.to_lowercase();
        if !lower.contains("load time") {
            continue;
        }

        if lower.contains("average") {
            if let Some((_, rest)) = line.split_once(':') {
                if let Some(value) = first_number(rest) {
                    times.average = Some(value);
                }
            }
        } else if let Some(idx) = lower.find("load time:") {
            let rest = &line[idx + "load time:".len()..];
            if let Some(value) = first_number(rest) {
                times.samples.push(value);
            }
        }
    }

    times
}

fn first_number(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Extract the screen name from a loading-time test, e.g.
/// `test_swap_loading_time[usdc]` -> `swap`. Returns None for ordinary tests.
pub fn screen_name(test_name: &str) -> Option<String> {
    let base = test_name.split('[').next().unwrap_or(test_name);
    base.strip_prefix("test_")?
        .strip_suffix("_loading_time")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
