use serde::{Deserialize, Serialize};

/// Indicator values attached to the most recent bar of a series
///
/// `None` marks a value that is undefined for the series it came from,
/// usually because the series is shorter than the indicator window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub high: f64,
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_ma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_ma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_volume: Option<f64>,
}

/// Window lengths used to build a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub short_ma: usize,
    pub long_ma: usize,
    pub rsi: usize,
}

impl IndicatorPeriods {
    /// Bars needed before every indicator is defined
    pub fn required_bars(&self) -> usize {
        self.short_ma.max(self.long_ma).max(self.rsi + 1)
    }
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            short_ma: 50,
            long_ma: 200,
            rsi: 14,
        }
    }
}
