//! Bounded-parallel batch screening

use crate::core::runtime::RunState;
use crate::error::ProviderError;
use crate::models::market::{Interval, Series, Symbol};
use crate::models::verdict::{ScreenReport, UnavailableReason, Verdict};
use crate::screening::rule::ScreeningRule;
use crate::services::market_data::TimeSeriesProvider;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_BARS: usize = 365;
pub const MAX_WORKERS: usize = 256;

/// Screens a symbol list with a fixed pool of workers
///
/// Workers pull symbols from a shared queue and publish verdicts to a single
/// aggregator. A symbol whose fetch or evaluation fails gets an
/// `Unavailable` verdict; its siblings are unaffected.
pub struct BatchScreener {
    provider: Arc<dyn TimeSeriesProvider>,
    rule: ScreeningRule,
    interval: Interval,
    bars: usize,
    workers: usize,
    run_state: RunState,
}

impl BatchScreener {
    pub fn new(
        provider: Arc<dyn TimeSeriesProvider>,
        rule: ScreeningRule,
        interval: Interval,
        run_state: RunState,
    ) -> Self {
        Self {
            provider,
            rule,
            interval,
            bars: DEFAULT_BARS,
            workers: DEFAULT_WORKERS,
            run_state,
        }
    }

    /// Set the worker pool size, clamped to `1..=MAX_WORKERS`
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Set how many bars are fetched per symbol
    pub fn with_bars(mut self, bars: usize) -> Self {
        self.bars = bars;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn rule(&self) -> &ScreeningRule {
        &self.rule
    }

    /// Screen every symbol and wait for the batch to finish
    ///
    /// Once the run state leaves `Running`, workers stop taking new symbols;
    /// units already in flight complete and the rest are reported as skipped.
    pub async fn screen(&self, symbols: &[Symbol]) -> ScreenReport {
        let start = Instant::now();
        let mut seen = HashSet::new();
        let queue: VecDeque<Symbol> = symbols
            .iter()
            .filter(|s| seen.insert((*s).clone()))
            .cloned()
            .collect();
        let total = queue.len();

        info!(
            symbols = total,
            workers = self.workers,
            interval = %self.interval,
            bars = self.bars,
            "BatchScreener: screening {} symbols with {} workers",
            total,
            self.workers
        );

        let pool = self.workers.min(total);
        let queue = Arc::new(Mutex::new(queue));
        let (tx, mut rx) = mpsc::channel::<(Symbol, Verdict)>(pool.max(1).saturating_mul(2));

        let mut handles = Vec::with_capacity(pool);
        for worker_id in 0..pool {
            let queue = queue.clone();
            let tx = tx.clone();
            let unit = ScreeningUnit {
                provider: self.provider.clone(),
                rule: self.rule,
                interval: self.interval,
                bars: self.bars,
            };
            let run_state = self.run_state.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if run_state.is_stopping() {
                        debug!(worker = worker_id, "BatchScreener: worker {} stopping", worker_id);
                        break;
                    }
                    let next = queue.lock().await.pop_front();
                    let Some(symbol) = next else {
                        break;
                    };

                    let verdict = unit.run_isolated(symbol.clone()).await;
                    if tx.send((symbol, verdict)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut report = ScreenReport::default();
        while let Some((symbol, verdict)) = rx.recv().await {
            match &verdict {
                Verdict::Pass => {
                    info!(symbol = %symbol, "Symbol {} meets the criteria", symbol)
                }
                Verdict::Fail(_) => {
                    info!(symbol = %symbol, verdict = %verdict, "Symbol {}: {}", symbol, verdict)
                }
                Verdict::Unavailable(_) => {
                    warn!(symbol = %symbol, verdict = %verdict, "Symbol {}: {}", symbol, verdict)
                }
            }
            report.verdicts.insert(symbol, verdict);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "BatchScreener: worker task failed: {}", e);
            }
        }

        report.skipped = queue.lock().await.drain(..).collect();
        if !report.skipped.is_empty() {
            warn!(
                skipped = report.skipped.len(),
                "BatchScreener: shutdown requested, {} symbols not screened",
                report.skipped.len()
            );
        }

        let passing = report.passing();
        let names: Vec<String> = passing.iter().map(|s| s.to_string()).collect();
        info!(
            passed = passing.len(),
            failed = report.failed().len(),
            unavailable = report.unavailable().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "BatchScreener: passing symbols: [{}]",
            names.join(", ")
        );

        report
    }
}

/// Everything one worker needs to screen a symbol
#[derive(Clone)]
struct ScreeningUnit {
    provider: Arc<dyn TimeSeriesProvider>,
    rule: ScreeningRule,
    interval: Interval,
    bars: usize,
}

impl ScreeningUnit {
    /// Run on a separate task so a panic becomes this symbol's verdict
    async fn run_isolated(&self, symbol: Symbol) -> Verdict {
        let unit = self.clone();
        let task_symbol = symbol.clone();
        match tokio::spawn(async move { unit.run(&task_symbol).await }).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Screening task for {} failed: {}", symbol, e);
                Verdict::Unavailable(UnavailableReason::Computation(format!(
                    "screening task failed: {}",
                    e
                )))
            }
        }
    }

    async fn run(&self, symbol: &Symbol) -> Verdict {
        info!(symbol = %symbol, "Screening {}", symbol);

        let bars = match self.provider.fetch(symbol, self.interval, self.bars).await {
            Ok(bars) => bars,
            Err(ProviderError::NoData { .. }) => {
                warn!(symbol = %symbol, "No data available for {}", symbol);
                return Verdict::Unavailable(UnavailableReason::NoData);
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Error fetching data for {}: {}", symbol, e);
                return Verdict::Unavailable(UnavailableReason::Provider(e.to_string()));
            }
        };

        if bars.is_empty() {
            warn!(symbol = %symbol, "No data available for {}", symbol);
            return Verdict::Unavailable(UnavailableReason::NoData);
        }

        let series = match Series::new(bars) {
            Ok(series) => series,
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Malformed series for {}: {}", symbol, e);
                return Verdict::Unavailable(UnavailableReason::Computation(e.to_string()));
            }
        };

        debug!(symbol = %symbol, bars = series.len(), "Fetched {} bars for {}", series.len(), symbol);
        self.rule.screen_series(&series)
    }
}
