//! Screening: the trend rule and the batch screener that applies it.

pub mod rule;
pub mod screener;

pub use rule::ScreeningRule;
pub use screener::{BatchScreener, DEFAULT_BARS, DEFAULT_WORKERS, MAX_WORKERS};
