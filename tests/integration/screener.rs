//! Batch screening against scripted providers

use std::sync::Arc;
use std::time::Duration;
use trendscreen::core::RunState;
use trendscreen::models::{Criterion, Interval, UnavailableReason, Verdict};
use trendscreen::screening::{BatchScreener, ScreeningRule, MAX_WORKERS};
use trendscreen::ProviderError;

use crate::test_utils::{daily_bars, falling_bars, nse, passing_bars, Scripted, StaticProvider};

fn screener(provider: Arc<StaticProvider>, workers: usize, run_state: RunState) -> BatchScreener {
    BatchScreener::new(provider, ScreeningRule::default(), Interval::Daily, run_state)
        .with_workers(workers)
}

#[tokio::test]
async fn failures_stay_with_their_symbol() {
    let mut shuffled = passing_bars(250);
    shuffled.swap(10, 11);

    let provider = Arc::new(
        StaticProvider::new()
            .with("AAA", Scripted::Bars(passing_bars(250)))
            .with(
                "BBB",
                Scripted::Error(ProviderError::Status {
                    status: 500,
                    body: "boom".to_string(),
                }),
            )
            .with("CCC", Scripted::Panic)
            .with("EEE", Scripted::Bars(shuffled))
            .with("FFF", Scripted::Bars(passing_bars(120)))
            .with("GGG", Scripted::Bars(falling_bars(250))),
    );
    let symbols: Vec<_> = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG"]
        .into_iter()
        .map(nse)
        .collect();

    let report = screener(provider, 3, RunState::new()).screen(&symbols).await;

    assert_eq!(report.verdicts.len(), 7);
    assert!(report.skipped.is_empty());
    assert_eq!(report.verdict(&nse("AAA")), Some(&Verdict::Pass));
    assert!(matches!(
        report.verdict(&nse("BBB")),
        Some(Verdict::Unavailable(UnavailableReason::Provider(_)))
    ));
    assert!(matches!(
        report.verdict(&nse("CCC")),
        Some(Verdict::Unavailable(UnavailableReason::Computation(_)))
    ));
    assert_eq!(
        report.verdict(&nse("DDD")),
        Some(&Verdict::Unavailable(UnavailableReason::NoData))
    );
    assert!(matches!(
        report.verdict(&nse("EEE")),
        Some(Verdict::Unavailable(UnavailableReason::Computation(_)))
    ));
    assert_eq!(
        report.verdict(&nse("FFF")),
        Some(&Verdict::Unavailable(UnavailableReason::InsufficientHistory {
            bars: 120,
            required: 200
        }))
    );
    match report.verdict(&nse("GGG")) {
        Some(Verdict::Fail(criteria)) => {
            assert!(criteria.contains(&Criterion::AboveShortMa));
            assert!(criteria.contains(&Criterion::AboveLongMa));
        }
        other => panic!("expected a failing verdict, got {:?}", other),
    }
    assert_eq!(report.passing(), vec![nse("AAA")]);
}

#[tokio::test]
async fn in_flight_fetches_never_exceed_pool_size() {
    let mut provider = StaticProvider::new().with_delay(Duration::from_millis(30));
    let symbols: Vec<_> = (0..12).map(|i| nse(&format!("SYM{}", i))).collect();
    for symbol in &symbols {
        provider = provider.with(&symbol.ticker, Scripted::Bars(passing_bars(250)));
    }
    let provider = Arc::new(provider);

    let report = screener(provider.clone(), 3, RunState::new())
        .screen(&symbols)
        .await;

    assert_eq!(report.passing().len(), 12);
    assert!(provider.max_in_flight() <= 3);
    assert!(provider.max_in_flight() >= 2);
}

#[tokio::test]
async fn each_symbol_is_screened_once_for_any_pool_size() {
    let tickers = ["AAA", "BBB", "AAA", "CCC", "DDD", "BBB", "EEE", "FFF", "CCC"];
    let symbols: Vec<_> = tickers.into_iter().map(nse).collect();

    let mut baseline = None;
    for workers in 1..=6 {
        let provider = Arc::new(
            StaticProvider::new()
                .with("AAA", Scripted::Bars(passing_bars(250)))
                .with("BBB", Scripted::Bars(falling_bars(250)))
                .with("CCC", Scripted::Bars(passing_bars(100)))
                .with("EEE", Scripted::Bars(passing_bars(300))),
        );

        let report = screener(provider.clone(), workers, RunState::new())
            .screen(&symbols)
            .await;

        let mut calls = provider.calls();
        assert_eq!(calls.len(), 6, "pool size {}", workers);
        calls.sort();
        calls.dedup();
        assert_eq!(calls.len(), 6, "pool size {}", workers);
        assert_eq!(report.verdicts.len(), 6);

        match &baseline {
            None => baseline = Some(report.verdicts),
            Some(expected) => assert_eq!(&report.verdicts, expected, "pool size {}", workers),
        }
    }
}

#[tokio::test]
async fn stop_request_skips_remaining_symbols() {
    let run_state = RunState::new();
    let provider = Arc::new(StaticProvider::new().stop_after(2, run_state.clone()));
    let symbols: Vec<_> = ["A", "B", "C", "D", "E", "F"].into_iter().map(nse).collect();

    let report = screener(provider.clone(), 1, run_state.clone())
        .screen(&symbols)
        .await;

    // the unit in flight when the stop arrived still completes
    assert_eq!(report.verdicts.len(), 2);
    assert_eq!(report.skipped, vec![nse("C"), nse("D"), nse("E"), nse("F")]);
    assert_eq!(provider.calls().len(), 2);
    assert!(run_state.is_stopping());
}

#[tokio::test]
async fn already_stopped_screens_nothing() {
    let run_state = RunState::new();
    run_state.request_stop();
    let provider = Arc::new(StaticProvider::new());
    let symbols = vec![nse("A"), nse("B")];

    let report = screener(provider.clone(), 2, run_state).screen(&symbols).await;

    assert!(report.verdicts.is_empty());
    assert_eq!(report.skipped, symbols);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn empty_universe_yields_empty_report() {
    let provider = Arc::new(StaticProvider::new());
    let report = screener(provider.clone(), 3, RunState::new()).screen(&[]).await;

    assert!(report.verdicts.is_empty());
    assert!(report.skipped.is_empty());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn unsorted_bars_are_malformed() {
    let mut bars = daily_bars(250, |i| (100.0 + i as f64, 101.0 + i as f64, 1000.0));
    bars.reverse();
    let provider = Arc::new(StaticProvider::new().with("REV", Scripted::Bars(bars)));

    let report = screener(provider, 1, RunState::new()).screen(&[nse("REV")]).await;

    assert!(report.verdict(&nse("REV")).unwrap().is_unavailable());
}

#[tokio::test]
async fn oversized_pool_is_clamped() {
    let provider = Arc::new(
        StaticProvider::new()
            .with("AAA", Scripted::Bars(passing_bars(250)))
            .with("BBB", Scripted::Bars(falling_bars(250))),
    );
    let screener = screener(provider.clone(), usize::MAX, RunState::new());

    assert_eq!(screener.workers(), MAX_WORKERS);
    assert_eq!(screener.rule(), &ScreeningRule::default());

    let report = screener.screen(&[nse("AAA"), nse("BBB")]).await;
    assert_eq!(report.passing(), vec![nse("AAA")]);
    assert_eq!(provider.calls().len(), 2);
}
