//! Screening outcomes and their aggregation

use crate::models::market::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One condition of the screening rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criterion {
    AboveShortMa,
    AboveLongMa,
    NearDayHigh,
    NotOverbought,
    AboveMeanVolume,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::AboveShortMa => "close above short MA",
            Criterion::AboveLongMa => "close above long MA",
            Criterion::NearDayHigh => "close near day high",
            Criterion::NotOverbought => "momentum below overbought",
            Criterion::AboveMeanVolume => "volume above mean",
        };
        f.write_str(name)
    }
}

/// Why a symbol could not be judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnavailableReason {
    NoData,
    InsufficientHistory { bars: usize, required: usize },
    UndefinedIndicator(String),
    Provider(String),
    Computation(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NoData => f.write_str("no data"),
            UnavailableReason::InsufficientHistory { bars, required } => {
                write!(f, "insufficient history ({} < {} bars)", bars, required)
            }
            UnavailableReason::UndefinedIndicator(name) => write!(f, "{} undefined", name),
            UnavailableReason::Provider(e) => write!(f, "provider error: {}", e),
            UnavailableReason::Computation(e) => write!(f, "computation error: {}", e),
        }
    }
}

/// Per-symbol result of one screening pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    /// Data was sufficient but these conditions did not hold
    Fail(Vec<Criterion>),
    Unavailable(UnavailableReason),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Verdict::Unavailable(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail(failed) => {
                let names: Vec<String> = failed.iter().map(|c| c.to_string()).collect();
                write!(f, "fail ({})", names.join(", "))
            }
            Verdict::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

/// Aggregated verdicts of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenReport {
    pub verdicts: BTreeMap<Symbol, Verdict>,
    /// Symbols never started because shutdown was requested mid-batch
    pub skipped: Vec<Symbol>,
}

impl ScreenReport {
    /// Passing symbols, sorted and free of duplicates
    pub fn passing(&self) -> Vec<Symbol> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.is_pass())
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn failed(&self) -> Vec<Symbol> {
        self.verdicts
            .iter()
            .filter(|(_, v)| matches!(v, Verdict::Fail(_)))
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn unavailable(&self) -> Vec<Symbol> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.is_unavailable())
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn verdict(&self, symbol: &Symbol) -> Option<&Verdict> {
        self.verdicts.get(symbol)
    }
}
