//! Deterministic SVG line charts.
//!
//! The markup is built with plain string writes so that identical input
//! series always produce identical bytes. Nothing here reads the clock.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use super::theme::{self, Theme};
use super::ChartError;
use crate::analysis::{stats, Metric, TimeSeries};

const TREND_WINDOW: usize = 3;
const MIN_POINTS_FOR_TREND: usize = 4;
const MAX_X_LABELS: usize = 8;

/// Render one metric's chart as SVG markup.
///
/// Fails when the series has no plottable points; gap points alone cannot
/// produce a chart.
pub fn render_svg(
    metric: Metric,
    series: &TimeSeries,
    target: Option<f64>,
    theme: &Theme,
) -> Result<String, ChartError> {
    if !series.has_values() {
        return Err(ChartError::EmptySeries {
            metric: metric.to_string(),
        });
    }

    let color = theme::metric_color(metric);
    let left = theme.margin_left;
    let top = theme.margin_top;
    let plot_w = theme.plot_width();
    let plot_h = theme.plot_height();
    let bottom = top + plot_h;

    // Display-space values, one slot per run; gaps stay None.
    let values: Vec<Option<f64>> = series
        .points
        .iter()
        .map(|p| p.value.map(|v| metric.display_value(v)))
        .collect();
    let bands: Vec<Option<(f64, f64)>> = series
        .points
        .iter()
        .map(|p| {
            p.band
                .map(|(lo, hi)| (metric.display_value(lo), metric.display_value(hi)))
        })
        .collect();

    let xs = x_positions(series, left, plot_w);
    let (lo, hi) = y_domain(&values, &bands, target);
    let y_of = |v: f64| top + (1.0 - (v - lo) / (hi - lo)) * plot_h;

    let mut svg = String::new();

    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{}' height='{}' viewBox='0 0 {} {}' role='img'>",
        theme.width, theme.height, theme.width, theme.height
    );
    let _ = writeln!(
        svg,
        "  <rect width='{}' height='{}' fill='#FFFFFF'/>",
        theme.width, theme.height
    );

    // Title
    let _ = writeln!(
        svg,
        "  <text x='{left:.2}' y='44' fill='{}' font-family='{}' font-size='26' font-weight='bold'>{}</text>",
        theme::DARK,
        theme.font_family,
        escape_text(metric.title())
    );

    // Plot background
    let _ = writeln!(
        svg,
        "  <rect x='{left:.2}' y='{top:.2}' width='{plot_w:.2}' height='{plot_h:.2}' rx='4' fill='{}'/>",
        theme::PLOT_BG
    );

    // Horizontal grid + y tick labels
    for i in 0..=4 {
        let value = lo + (hi - lo) * f64::from(i) / 4.0;
        let y = y_of(value);
        let _ = writeln!(
            svg,
            "  <line x1='{left:.2}' y1='{y:.2}' x2='{:.2}' y2='{y:.2}' stroke='{}' stroke-width='1.5'/>",
            left + plot_w,
            theme::GRID
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.2}' y='{:.2}' text-anchor='end' fill='{}' font-family='{}' font-size='15'>{}</text>",
            left - 12.0,
            y + 5.0,
            theme::DARK,
            theme.font_family,
            fmt_value(value)
        );
    }

    // Vertical grid + date labels
    for (x, label) in x_labels(series, &xs) {
        let _ = writeln!(
            svg,
            "  <line x1='{x:.2}' y1='{top:.2}' x2='{x:.2}' y2='{bottom:.2}' stroke='{}' stroke-width='1'/>",
            theme::GRID
        );
        let _ = writeln!(
            svg,
            "  <text x='{x:.2}' y='{:.2}' text-anchor='middle' fill='{}' font-family='{}' font-size='15'>{}</text>",
            bottom + 28.0,
            theme::DARK,
            theme.font_family,
            escape_text(&label)
        );
    }

    // Axis labels
    let _ = writeln!(
        svg,
        "  <text x='{:.2}' y='{:.2}' text-anchor='middle' fill='{}' font-family='{}' font-size='18'>Date</text>",
        left + plot_w / 2.0,
        bottom + 62.0,
        theme::DARK,
        theme.font_family
    );
    let _ = writeln!(
        svg,
        "  <text x='24' y='{:.2}' text-anchor='middle' fill='{}' font-family='{}' font-size='18' transform='rotate(-90 24 {:.2})'>{}</text>",
        top + plot_h / 2.0,
        theme::DARK,
        theme.font_family,
        top + plot_h / 2.0,
        escape_text(metric.y_label())
    );

    // Target line
    if let Some(target) = target {
        let y = y_of(target);
        let _ = writeln!(
            svg,
            "  <line x1='{left:.2}' y1='{y:.2}' x2='{:.2}' y2='{y:.2}' stroke='{}' stroke-width='2' stroke-dasharray='10 6' opacity='0.5'/>",
            left + plot_w,
            theme::SUCCESS
        );
    }

    // Area fill and line, segment by segment so gaps break the line.
    let segments = value_segments(&values);
    for segment in &segments {
        if segment.len() >= 2 {
            let mut fill = String::new();
            let mut line = String::new();
            for (i, &idx) in segment.iter().enumerate() {
                let x = xs[idx];
                let y = y_of(values[idx].unwrap_or_default());
                if i == 0 {
                    let _ = write!(fill, "M{x:.2} {bottom:.2} L{x:.2} {y:.2}");
                    let _ = write!(line, "M{x:.2} {y:.2}");
                } else {
                    let _ = write!(fill, " L{x:.2} {y:.2}");
                    let _ = write!(line, " L{x:.2} {y:.2}");
                }
            }
            if let Some(&last) = segment.last() {
                let _ = write!(fill, " L{:.2} {bottom:.2} Z", xs[last]);
            }
            let _ = writeln!(svg, "  <path d='{fill}' fill='{color}' fill-opacity='0.2'/>");
            let _ = writeln!(
                svg,
                "  <path d='{line}' fill='none' stroke='{color}' stroke-width='3' stroke-linecap='round' stroke-linejoin='round'/>"
            );
        }
    }

    // Trend overlay: dashed moving average once there is enough history.
    if series.plottable().count() >= MIN_POINTS_FOR_TREND {
        let trend: Vec<Option<f64>> = stats::moving_average(series, TREND_WINDOW)
            .into_iter()
            .map(|v| v.map(|v| metric.display_value(v)))
            .collect();
        for segment in value_segments(&trend) {
            if segment.len() < 2 {
                continue;
            }
            let mut path = String::new();
            for (i, &idx) in segment.iter().enumerate() {
                let x = xs[idx];
                let y = y_of(trend[idx].unwrap_or_default());
                if i == 0 {
                    let _ = write!(path, "M{x:.2} {y:.2}");
                } else {
                    let _ = write!(path, " L{x:.2} {y:.2}");
                }
            }
            let _ = writeln!(
                svg,
                "  <path d='{path}' fill='none' stroke='{}' stroke-width='2' stroke-dasharray='6 5' opacity='0.6'/>",
                theme::DARK
            );
        }
    }

    // Error bars for points that carry a min..max band.
    for (idx, band) in bands.iter().enumerate() {
        if let (Some((b_lo, b_hi)), Some(_)) = (band, values[idx]) {
            let x = xs[idx];
            let y_hi = y_of(*b_hi);
            let y_lo = y_of(*b_lo);
            let _ = writeln!(
                svg,
                "  <line x1='{x:.2}' y1='{y_lo:.2}' x2='{x:.2}' y2='{y_hi:.2}' stroke='{color}' stroke-width='2' opacity='0.9'/>"
            );
            for y in [y_lo, y_hi] {
                let _ = writeln!(
                    svg,
                    "  <line x1='{:.2}' y1='{y:.2}' x2='{:.2}' y2='{y:.2}' stroke='{color}' stroke-width='2' opacity='0.9'/>",
                    x - 6.0,
                    x + 6.0
                );
            }
        }
    }

    // Markers
    for (idx, value) in values.iter().enumerate() {
        if let Some(v) = value {
            let _ = writeln!(
                svg,
                "  <circle cx='{:.2}' cy='{:.2}' r='5' fill='{color}'/>",
                xs[idx],
                y_of(*v)
            );
        }
    }

    // Legend
    let legend_x = left + plot_w - 190.0;
    let legend_label = metric.title().split_whitespace().next().unwrap_or("Series");
    let _ = writeln!(
        svg,
        "  <rect x='{:.2}' y='{:.2}' width='24' height='4' rx='2' fill='{color}'/>",
        legend_x,
        top + 16.0
    );
    let _ = writeln!(
        svg,
        "  <text x='{:.2}' y='{:.2}' fill='{}' font-family='{}' font-size='15'>{}</text>",
        legend_x + 32.0,
        top + 22.0,
        theme::DARK,
        theme.font_family,
        escape_text(legend_label)
    );
    if target.is_some() {
        let _ = writeln!(
            svg,
            "  <rect x='{:.2}' y='{:.2}' width='24' height='4' rx='2' fill='{}' opacity='0.5'/>",
            legend_x,
            top + 38.0,
            theme::SUCCESS
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.2}' y='{:.2}' fill='{}' font-family='{}' font-size='15'>Target</text>",
            legend_x + 32.0,
            top + 44.0,
            theme::DARK,
            theme.font_family
        );
    }

    let _ = writeln!(svg, "</svg>");

    Ok(svg)
}

/// Time-proportional x coordinate for every point (gaps included).
fn x_positions(series: &TimeSeries, left: f64, plot_w: f64) -> Vec<f64> {
    let first = series.points.first().map(|p| p.timestamp);
    let last = series.points.last().map(|p| p.timestamp);

    match (first, last) {
        (Some(t0), Some(tn)) if tn > t0 => {
            let span = (tn - t0).num_milliseconds() as f64;
            series
                .points
                .iter()
                .map(|p| {
                    let offset = (p.timestamp - t0).num_milliseconds() as f64;
                    left + offset / span * plot_w
                })
                .collect()
        }
        // Single run: center it.
        _ => vec![left + plot_w / 2.0; series.len()],
    }
}

/// Display-space value domain with padding; the target line is kept in view.
fn y_domain(
    values: &[Option<f64>],
    bands: &[Option<(f64, f64)>],
    target: Option<f64>,
) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;

    let mut take = |v: f64| {
        lo = lo.min(v);
        hi = hi.max(v);
    };
    for v in values.iter().flatten() {
        take(*v);
    }
    for (b_lo, b_hi) in bands.iter().flatten() {
        take(*b_lo);
        take(*b_hi);
    }
    if let Some(t) = target {
        take(t);
    }

    if hi <= lo {
        let pad = lo.abs().max(1.0) * 0.1;
        return (lo - pad, lo + pad);
    }

    let pad = (hi - lo) * 0.08;
    let padded_lo = if lo >= 0.0 && lo - pad < 0.0 {
        0.0
    } else {
        lo - pad
    };
    (padded_lo, hi + pad)
}

/// Runs of consecutive indices that carry a value.
fn value_segments(values: &[Option<f64>]) -> Vec<Vec<usize>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();

    for (idx, value) in values.iter().enumerate() {
        if value.is_some() {
            current.push(idx);
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Date labels, thinned to a readable count and deduplicated when several
/// runs land on the same day.
fn x_labels(series: &TimeSeries, xs: &[f64]) -> Vec<(f64, String)> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }

    let step = n.div_ceil(MAX_X_LABELS);
    let mut labels: Vec<(f64, String)> = Vec::new();

    for idx in (0..n).step_by(step.max(1)) {
        let label = format_date(series.points[idx].timestamp);
        if labels.last().is_some_and(|(_, prev)| *prev == label) {
            continue;
        }
        labels.push((xs[idx], label));
    }

    labels
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn fmt_value(v: f64) -> String {
    let magnitude = v.abs();
    if magnitude >= 100.0 {
        format!("{v:.0}")
    } else if magnitude >= 10.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.2}")
    }
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
