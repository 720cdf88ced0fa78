//! Metric aggregation -- run history to per-metric time series.

pub mod aggregator;
pub mod stats;

use chrono::{DateTime, Utc};

/// The six tracked benchmark metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SwapLoadTime,
    WalletLoadTime,
    PassRate,
    TotalDuration,
    RetryCount,
    FlakyTests,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::SwapLoadTime,
        Metric::WalletLoadTime,
        Metric::PassRate,
        Metric::TotalDuration,
        Metric::RetryCount,
        Metric::FlakyTests,
    ];

    /// File name of the chart artifact for this metric.
    pub fn file_name(&self) -> &'static str {
        match self {
            Metric::SwapLoadTime => "swap_loading_time.png",
            Metric::WalletLoadTime => "wallet_loading_time.png",
            Metric::PassRate => "pass_rate_trend.png",
            Metric::TotalDuration => "total_duration.png",
            Metric::RetryCount => "retry_count.png",
            Metric::FlakyTests => "flaky_tests.png",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Metric::SwapLoadTime => "Swap Screen Loading Time Performance",
            Metric::WalletLoadTime => "Wallet Screen Loading Time Performance",
            Metric::PassRate => "Pass Rate Trend",
            Metric::TotalDuration => "Total Test Suite Duration",
            Metric::RetryCount => "Test Retries Over Time",
            Metric::FlakyTests => "Flaky Tests Over Time",
        }
    }

    pub fn y_label(&self) -> &'static str {
        match self {
            Metric::SwapLoadTime | Metric::WalletLoadTime => "Load Time (ms)",
            Metric::PassRate => "Pass Rate (%)",
            Metric::TotalDuration => "Duration (minutes)",
            Metric::RetryCount => "Retry Count",
            Metric::FlakyTests => "Flaky Test Count",
        }
    }

    /// Screen this metric tracks, for the load-time metrics.
    pub fn screen(&self) -> Option<&'static str> {
        match self {
            Metric::SwapLoadTime => Some("swap"),
            Metric::WalletLoadTime => Some("wallet"),
            _ => None,
        }
    }

    /// Transform a raw aggregated value into its display unit: pass rate as
    /// percent, suite duration in minutes, everything else unchanged.
    pub fn display_value(&self, raw: f64) -> f64 {
        match self {
            Metric::PassRate => raw * 100.0,
            Metric::TotalDuration => raw / 1000.0 / 60.0,
            _ => raw,
        }
    }

    /// Unit suffix used in summaries, matching `display_value`.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::SwapLoadTime | Metric::WalletLoadTime => "ms",
            Metric::PassRate => "%",
            Metric::TotalDuration => "min",
            Metric::RetryCount | Metric::FlakyTests => "",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slug = match self {
            Metric::SwapLoadTime => "swap_loading_time",
            Metric::WalletLoadTime => "wallet_loading_time",
            Metric::PassRate => "pass_rate",
            Metric::TotalDuration => "total_duration",
            Metric::RetryCount => "retry_count",
            Metric::FlakyTests => "flaky_tests",
        };
        write!(f, "{slug}")
    }
}

/// One sample in a metric's history. A point with no value is a gap: the run
/// happened but the metric was undefined for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
    /// Optional min..max spread around the value (load-time error bars).
    pub band: Option<(f64, f64)>,
}

/// Ordered per-metric history, derived from run records and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the series carries at least one plottable value.
    pub fn has_values(&self) -> bool {
        self.points.iter().any(|p| p.value.is_some())
    }

    /// Points that carry a value, in order.
    pub fn plottable(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.timestamp, v)))
    }

    pub fn push_value(&mut self, timestamp: DateTime<Utc>, value: f64, band: Option<(f64, f64)>) {
        self.points.push(SeriesPoint {
            timestamp,
            value: Some(value),
            band,
        });
    }

    pub fn push_gap(&mut self, timestamp: DateTime<Utc>) {
        self.points.push(SeriesPoint {
            timestamp,
            value: None,
            band: None,
        });
    }
}
