//! Unit tests for verdict aggregation

use trendscreen::models::{Criterion, ScreenReport, Symbol, UnavailableReason, Verdict};

#[test]
fn test_report_buckets_are_distinct() {
    let mut report = ScreenReport::default();
    report.verdicts.insert(Symbol::new("B", "NSE"), Verdict::Pass);
    report.verdicts.insert(Symbol::new("A", "NSE"), Verdict::Pass);
    report
        .verdicts
        .insert(Symbol::new("C", "NSE"), Verdict::Fail(vec![Criterion::NotOverbought]));
    report.verdicts.insert(
        Symbol::new("D", "NSE"),
        Verdict::Unavailable(UnavailableReason::NoData),
    );

    assert_eq!(
        report.passing(),
        vec![Symbol::new("A", "NSE"), Symbol::new("B", "NSE")]
    );
    assert_eq!(report.failed(), vec![Symbol::new("C", "NSE")]);
    assert_eq!(report.unavailable(), vec![Symbol::new("D", "NSE")]);
}

#[test]
fn test_verdict_display_includes_reason() {
    let verdict = Verdict::Unavailable(UnavailableReason::InsufficientHistory {
        bars: 120,
        required: 200,
    });
    assert_eq!(
        verdict.to_string(),
        "unavailable (insufficient history (120 < 200 bars))"
    );

    let verdict = Verdict::Fail(vec![Criterion::AboveLongMa, Criterion::NotOverbought]);
    assert_eq!(
        verdict.to_string(),
        "fail (close above long MA, momentum below overbought)"
    );
}
