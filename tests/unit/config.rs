//! Unit tests for configuration loading

use std::collections::HashMap;
use std::time::Duration;
use trendscreen::config::ScreenerConfig;
use trendscreen::models::Interval;
use trendscreen::ConfigError;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = ScreenerConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.interval, Interval::Daily);
    assert_eq!(config.bars, 365);
    assert_eq!(config.workers, 3);
    assert_eq!(config.default_exchange, "NSE");
    assert_eq!(config.rule.periods.short_ma, 50);
    assert_eq!(config.rule.periods.long_ma, 200);
    assert_eq!(config.rule.periods.rsi, 14);
    assert_eq!(config.rule.high_proximity, 0.999);
    assert_eq!(config.rule.overbought, 70.0);
    assert!(config.universe_file.is_none());
    assert!(!config.exit_when_idle);
}

#[test]
fn test_overrides() {
    let config = ScreenerConfig::from_lookup(lookup(&[
        ("SCREEN_INTERVAL", "1h"),
        ("SCREEN_BARS", "500"),
        ("SCREEN_WORKERS", "8"),
        ("DEFAULT_EXCHANGE", "BSE"),
        ("LONG_MA_PERIOD", "100"),
        ("RSI_OVERBOUGHT", "65.5"),
        ("SYMBOLS", "TCS,INFY"),
        ("MARKET_DATA_URL", "https://data.example.com/api"),
        ("EXIT_WHEN_IDLE", "true"),
    ]))
    .unwrap();

    assert_eq!(config.interval, Interval::OneHour);
    assert_eq!(config.bars, 500);
    assert_eq!(config.workers, 8);
    assert_eq!(config.default_exchange, "BSE");
    assert_eq!(config.rule.periods.long_ma, 100);
    assert_eq!(config.rule.overbought, 65.5);
    assert_eq!(config.symbols.as_deref(), Some("TCS,INFY"));
    assert_eq!(config.market_data_url.as_str(), "https://data.example.com/api");
    assert!(config.exit_when_idle);
}

#[test]
fn test_blank_values_fall_back_to_defaults() {
    let config = ScreenerConfig::from_lookup(lookup(&[("SCREEN_WORKERS", "  ")])).unwrap();
    assert_eq!(config.workers, 3);
}

#[test]
fn test_zero_workers_rejected() {
    let err = ScreenerConfig::from_lookup(lookup(&[("SCREEN_WORKERS", "0")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            key: "SCREEN_WORKERS",
            ..
        }
    ));
}

#[test]
fn test_invalid_values_rejected() {
    let err = ScreenerConfig::from_lookup(lookup(&[("SCREEN_INTERVAL", "fortnightly")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "SCREEN_INTERVAL", .. }));

    let err = ScreenerConfig::from_lookup(lookup(&[("SCREEN_BARS", "many")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "SCREEN_BARS", .. }));

    let err = ScreenerConfig::from_lookup(lookup(&[("MARKET_FEED_URL", "not a url")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "MARKET_FEED_URL", .. }));

    let err = ScreenerConfig::from_lookup(lookup(&[("RSI_PERIOD", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "RSI_PERIOD", .. }));
}

#[test]
fn test_oversized_values_rejected() {
    let max = usize::MAX.to_string();
    for key in [
        "SCREEN_WORKERS",
        "SCREEN_BARS",
        "FEED_BUFFER",
        "SHORT_MA_PERIOD",
        "LONG_MA_PERIOD",
        "RSI_PERIOD",
    ] {
        let err = ScreenerConfig::from_lookup(lookup(&[(key, max.as_str())])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key: rejected, .. } => assert_eq!(rejected, key),
            other => panic!("{}: expected InvalidValue, got {:?}", key, other),
        }
    }

    let err = ScreenerConfig::from_lookup(lookup(&[("SCREEN_WORKERS", "257")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "SCREEN_WORKERS", .. }));
    let config = ScreenerConfig::from_lookup(lookup(&[("SCREEN_WORKERS", "256")])).unwrap();
    assert_eq!(config.workers, 256);
}

#[test]
fn test_thresholds_must_be_in_range() {
    for (key, value) in [
        ("HIGH_PROXIMITY", "1.5"),
        ("HIGH_PROXIMITY", "NaN"),
        ("RSI_OVERBOUGHT", "-1"),
        ("RSI_OVERBOUGHT", "101"),
    ] {
        let err = ScreenerConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { .. }),
            "{}={} should be rejected",
            key,
            value
        );
    }
}

#[test]
fn test_feed_connect_timeout() {
    let config = ScreenerConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.feed_connect_timeout, Duration::from_secs(10));

    let config = ScreenerConfig::from_lookup(lookup(&[("FEED_CONNECT_TIMEOUT", "3")])).unwrap();
    assert_eq!(config.feed_connect_timeout, Duration::from_secs(3));

    let err = ScreenerConfig::from_lookup(lookup(&[("FEED_CONNECT_TIMEOUT", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "FEED_CONNECT_TIMEOUT", .. }));
}
