//! Indicator engine: pure functions over owned bar data.

pub mod momentum;
pub mod trend;
pub mod volume;

use crate::models::indicators::{IndicatorPeriods, IndicatorSnapshot};
use crate::models::market::Series;

pub use momentum::{latest_rsi, rsi_series};
pub use trend::{latest_sma, sma_series};
pub use volume::mean_volume;

/// Compute every screening indicator for the latest bar of `series`
///
/// Returns `None` only for an empty series; individual indicators that
/// lack history are left undefined inside the snapshot.
pub fn snapshot(series: &Series, periods: &IndicatorPeriods) -> Option<IndicatorSnapshot> {
    let last = series.last()?;
    let closes = series.closes();
    let volumes = series.volumes();

    Some(IndicatorSnapshot {
        close: last.close,
        high: last.high,
        volume: last.volume,
        short_ma: latest_sma(&closes, periods.short_ma),
        long_ma: latest_sma(&closes, periods.long_ma),
        rsi: latest_rsi(&closes, periods.rsi),
        mean_volume: mean_volume(&volumes),
    })
}
