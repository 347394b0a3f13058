//! Shared data models spanning the screening and streaming phases.

pub mod indicators;
pub mod market;
pub mod verdict;

pub use indicators::{IndicatorPeriods, IndicatorSnapshot};
pub use market::{Bar, Interval, Series, Symbol};
pub use verdict::{Criterion, ScreenReport, UnavailableReason, Verdict};
