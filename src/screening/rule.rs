//! The trend screening rule

use crate::indicators;
use crate::models::indicators::{IndicatorPeriods, IndicatorSnapshot};
use crate::models::market::Series;
use crate::models::verdict::{Criterion, UnavailableReason, Verdict};
use serde::{Deserialize, Serialize};

/// Close above both moving averages, near the day high, not overbought,
/// on above-average volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRule {
    pub periods: IndicatorPeriods,
    /// Minimum close / day-high ratio
    pub high_proximity: f64,
    /// Momentum must stay strictly below this value
    pub overbought: f64,
}

impl Default for ScreeningRule {
    fn default() -> Self {
        Self {
            periods: IndicatorPeriods::default(),
            high_proximity: 0.999,
            overbought: 70.0,
        }
    }
}

impl ScreeningRule {
    /// Bars a series needs before the rule can judge it
    pub fn required_bars(&self) -> usize {
        self.periods.required_bars()
    }

    /// Judge a whole series
    pub fn screen_series(&self, series: &Series) -> Verdict {
        let required = self.required_bars();
        if series.is_empty() {
            return Verdict::Unavailable(UnavailableReason::NoData);
        }
        if series.len() < required {
            return Verdict::Unavailable(UnavailableReason::InsufficientHistory {
                bars: series.len(),
                required,
            });
        }
        match indicators::snapshot(series, &self.periods) {
            Some(snapshot) => self.evaluate(&snapshot),
            None => Verdict::Unavailable(UnavailableReason::NoData),
        }
    }

    /// Judge a precomputed snapshot
    pub fn evaluate(&self, snapshot: &IndicatorSnapshot) -> Verdict {
        let (close, high, volume) = (snapshot.close, snapshot.high, snapshot.volume);
        let (short_ma, long_ma, rsi, mean_volume) = match defined_inputs(snapshot) {
            Ok(values) => values,
            Err(name) => {
                return Verdict::Unavailable(UnavailableReason::UndefinedIndicator(
                    name.to_string(),
                ))
            }
        };

        let checks = [
            (Criterion::AboveShortMa, close > short_ma),
            (Criterion::AboveLongMa, close > long_ma),
            (Criterion::NearDayHigh, close >= high * self.high_proximity),
            (Criterion::NotOverbought, rsi < self.overbought),
            (Criterion::AboveMeanVolume, volume > mean_volume),
        ];

        let failed: Vec<Criterion> = checks
            .iter()
            .filter(|(_, held)| !held)
            .map(|(criterion, _)| *criterion)
            .collect();

        if failed.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail(failed)
        }
    }
}

/// Moving averages, momentum and mean volume, or the name of the first undefined input
fn defined_inputs(snapshot: &IndicatorSnapshot) -> Result<(f64, f64, f64, f64), &'static str> {
    defined("close", Some(snapshot.close))?;
    defined("high", Some(snapshot.high))?;
    defined("volume", Some(snapshot.volume))?;
    Ok((
        defined("short_ma", snapshot.short_ma)?,
        defined("long_ma", snapshot.long_ma)?,
        defined("rsi", snapshot.rsi)?,
        defined("mean_volume", snapshot.mean_volume)?,
    ))
}

fn defined(name: &'static str, value: Option<f64>) -> Result<f64, &'static str> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(name),
    }
}
