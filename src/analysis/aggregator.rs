//! Builds per-metric time series from an ordered run history.

use crate::analysis::{Metric, TimeSeries};
use crate::ingest::RunRecord;

/// Aggregated series for every tracked metric, one point per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSeries {
    pub swap_load_time: TimeSeries,
    pub wallet_load_time: TimeSeries,
    pub pass_rate: TimeSeries,
    pub total_duration: TimeSeries,
    pub retry_count: TimeSeries,
    pub flaky_tests: TimeSeries,
}

impl MetricSeries {
    pub fn get(&self, metric: Metric) -> &TimeSeries {
        match metric {
            Metric::SwapLoadTime => &self.swap_load_time,
            Metric::WalletLoadTime => &self.wallet_load_time,
            Metric::PassRate => &self.pass_rate,
            Metric::TotalDuration => &self.total_duration,
            Metric::RetryCount => &self.retry_count,
            Metric::FlakyTests => &self.flaky_tests,
        }
    }
}

/// Compute one TimeSeries per tracked metric from runs ordered by timestamp
/// ascending. Every series has exactly one point per run; metrics that are
/// undefined for a run (no executed tests, no timing for a screen) get a gap
/// there, never a filled-in value.
pub fn aggregate(runs: &[RunRecord]) -> MetricSeries {
    let mut series = MetricSeries::default();

    for run in runs {
        let ts = run.timestamp;

        match run.pass_rate() {
            Some(rate) => series.pass_rate.push_value(ts, rate, None),
            None => series.pass_rate.push_gap(ts),
        }

        series
            .total_duration
            .push_value(ts, run.total_duration_ms as f64, None);
        series
            .retry_count
            .push_value(ts, f64::from(run.total_retries), None);
        series
            .flaky_tests
            .push_value(ts, f64::from(run.flaky_tests), None);

        push_screen_point(&mut series.swap_load_time, run, "swap");
        push_screen_point(&mut series.wallet_load_time, run, "wallet");
    }

    series
}

fn push_screen_point(series: &mut TimeSeries, run: &RunRecord, screen: &str) {
    match run.screen(screen) {
        Some(timing) => {
            series.push_value(
                run.timestamp,
                timing.avg_ms,
                Some((timing.min_ms, timing.max_ms)),
            );
        }
        None => series.push_gap(run.timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ScreenTiming;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn run(secs: i64, passed: u32, failed: u32) -> RunRecord {
        RunRecord {
            run_id: format!("run-{secs}"),
            timestamp: ts(secs),
            passed,
            failed,
            broken: 0,
            skipped: 0,
            unknown: 0,
            total_duration_ms: 120_000,
            min_duration_ms: 10,
            max_duration_ms: 9000,
            avg_duration_ms: 1200.0,
            total_retries: 3,
            flaky_tests: 1,
            flaky_test_ids: vec!["test_send".into()],
            screens: Vec::new(),
        }
    }

    #[test]
    fn test_pass_rate_gap_on_zero_denominator() {
        // t=1: 90 passed / 10 failed; t=2: nothing executed.
        let runs = vec![run(1, 90, 10), run(2, 0, 0)];
        let series = aggregate(&runs);

        assert_eq!(series.pass_rate.len(), 2);
        assert_eq!(series.pass_rate.points[0].value, Some(0.9));
        assert_eq!(series.pass_rate.points[1].value, None);
        assert_eq!(series.pass_rate.points[0].timestamp, ts(1));
        assert_eq!(series.pass_rate.points[1].timestamp, ts(2));
    }

    #[test]
    fn test_series_length_matches_run_count() {
        let runs: Vec<RunRecord> = (1..=5).map(|i| run(i, 10, 0)).collect();
        let series = aggregate(&runs);

        for metric in Metric::ALL {
            assert_eq!(series.get(metric).len(), runs.len(), "{metric}");
        }
    }

    #[test]
    fn test_screen_series_values_and_gaps() {
        let mut first = run(1, 10, 0);
        first.screens = vec![ScreenTiming {
            screen: "swap".into(),
            min_ms: 800.0,
            max_ms: 1200.0,
            avg_ms: 1000.0,
            samples: vec![800.0, 1200.0],
        }];
        let second = run(2, 10, 0); // no swap timing this run

        let series = aggregate(&[first, second]);

        assert_eq!(series.swap_load_time.points[0].value, Some(1000.0));
        assert_eq!(series.swap_load_time.points[0].band, Some((800.0, 1200.0)));
        assert_eq!(series.swap_load_time.points[1].value, None);

        // Wallet never reported: two gaps, still one point per run.
        assert_eq!(series.wallet_load_time.len(), 2);
        assert!(!series.wallet_load_time.has_values());
    }

    #[test]
    fn test_count_metrics() {
        let series = aggregate(&[run(1, 10, 0)]);
        assert_eq!(series.retry_count.points[0].value, Some(3.0));
        assert_eq!(series.flaky_tests.points[0].value, Some(1.0));
        assert_eq!(series.total_duration.points[0].value, Some(120_000.0));
    }

    #[test]
    fn test_empty_history() {
        let series = aggregate(&[]);
        for metric in Metric::ALL {
            assert!(series.get(metric).is_empty());
        }
    }
}
