//! Descriptive statistics over metric series.
//!
//! Computed in Rust rather than SQL so gaps keep their meaning: a gap point
//! contributes nothing to any statistic.

use crate::analysis::TimeSeries;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    let mut lo = first;
    let mut hi = first;
    for v in iter {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    Some((lo, hi))
}

/// Trailing moving average aligned to the series' points: at each point that
/// carries a value, the mean of the last `window` values seen so far. Gap
/// points stay None and are not counted toward the window.
pub fn moving_average(series: &TimeSeries, window: usize) -> Vec<Option<f64>> {
    assert!(window > 0, "moving average window must be positive");

    let mut recent: Vec<f64> = Vec::with_capacity(window);
    let mut out = Vec::with_capacity(series.len());

    for point in &series.points {
        match point.value {
            Some(v) => {
                recent.push(v);
                if recent.len() > window {
                    recent.remove(0);
                }
                out.push(mean(&recent));
            }
            None => out.push(None),
        }
    }

    out
}

/// Compact description of a series, used for README summary lines.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub latest: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of runs that carried a value (gaps excluded).
    pub samples: usize,
}

/// Summarize the plottable values of a series. None when the series carries
/// no values at all.
pub fn summarize(series: &TimeSeries) -> Option<SeriesSummary> {
    let values: Vec<f64> = series.plottable().map(|(_, v)| v).collect();
    let (min, max) = min_max(&values)?;

    Some(SeriesSummary {
        latest: *values.last()?,
        min,
        max,
        mean: mean(&values)?,
        samples: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series(values: &[Option<f64>]) -> TimeSeries {
        let mut s = TimeSeries::default();
        for (i, v) in values.iter().enumerate() {
            let ts = Utc.timestamp_opt(i as i64 + 1, 0).unwrap();
            match v {
                Some(v) => s.push_value(ts, *v, None),
                None => s.push_gap(ts),
            }
        }
        s
    }

    #[test]
    fn test_mean_and_min_max() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(min_max(&[3.0, 1.0, 2.0]), Some((1.0, 3.0)));
        assert_eq!(min_max(&[]), None);
    }

    #[test]
    fn test_moving_average_skips_gaps() {
        let s = series(&[Some(1.0), Some(3.0), None, Some(5.0)]);
        let avg = moving_average(&s, 2);

        assert_eq!(avg.len(), 4);
        assert_eq!(avg[0], Some(1.0));
        assert_eq!(avg[1], Some(2.0));
        assert_eq!(avg[2], None);
        // Window spans the gap: mean of 3.0 and 5.0.
        assert_eq!(avg[3], Some(4.0));
    }

    #[test]
    fn test_summarize() {
        let s = series(&[Some(10.0), None, Some(20.0), Some(12.0)]);
        let summary = summarize(&s).unwrap();

        assert_eq!(summary.latest, 12.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 20.0);
        assert_eq!(summary.mean, 14.0);
        assert_eq!(summary.samples, 3);
    }

    #[test]
    fn test_summarize_all_gaps_is_none() {
        let s = series(&[None, None]);
        assert!(summarize(&s).is_none());
        assert!(summarize(&TimeSeries::default()).is_none());
    }
}
