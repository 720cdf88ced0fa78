//! Chart palette and canvas geometry.

use crate::analysis::Metric;

pub const PRIMARY: &str = "#2E86DE";
pub const SUCCESS: &str = "#10AC84";
pub const WARNING: &str = "#F79F1F";
pub const DANGER: &str = "#EE5A6F";
pub const INFO: &str = "#54A0FF";
pub const DARK: &str = "#2C3E50";

/// Plot area background and gridline colors (darkgrid look).
pub const PLOT_BG: &str = "#EAEAF2";
pub const GRID: &str = "#FFFFFF";

#[derive(Debug, Clone)]
pub struct Theme {
    pub width: u32,
    pub height: u32,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub font_family: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 700,
            margin_left: 90.0,
            margin_right: 50.0,
            margin_top: 80.0,
            margin_bottom: 90.0,
            font_family: "DejaVu Sans, Verdana, sans-serif",
        }
    }
}

impl Theme {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn plot_width(&self) -> f64 {
        f64::from(self.width) - self.margin_left - self.margin_right
    }

    pub fn plot_height(&self) -> f64 {
        f64::from(self.height) - self.margin_top - self.margin_bottom
    }
}

/// Line color for a metric's chart.
pub fn metric_color(metric: Metric) -> &'static str {
    match metric {
        Metric::SwapLoadTime => SUCCESS,
        Metric::WalletLoadTime => PRIMARY,
        Metric::PassRate => PRIMARY,
        Metric::TotalDuration => INFO,
        Metric::RetryCount => WARNING,
        Metric::FlakyTests => DANGER,
    }
}
