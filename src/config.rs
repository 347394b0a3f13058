//! Environment-driven configuration

use crate::error::ConfigError;
use crate::models::indicators::IndicatorPeriods;
use crate::models::market::Interval;
use crate::screening::{ScreeningRule, DEFAULT_BARS, DEFAULT_WORKERS, MAX_WORKERS};
use crate::services::stream::DEFAULT_CONNECT_TIMEOUT;
use crate::subscriptions::{DEFAULT_FEED_BUFFER, MAX_FEED_BUFFER};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_EXCHANGE: &str = "NSE";
pub const DEFAULT_MARKET_DATA_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_MARKET_FEED_URL: &str = "ws://127.0.0.1:8080/stream";

/// Longest accepted indicator window
pub const MAX_PERIOD: usize = 10_000;
/// Longest accepted history request
pub const MAX_BARS: usize = 100_000;
/// Longest accepted feed connect timeout, in seconds
pub const MAX_CONNECT_TIMEOUT_SECS: u64 = 300;

/// Deployment environment (`APP_ENV`), defaults to `sandbox`
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

/// Everything the screener binary needs to run
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub interval: Interval,
    pub bars: usize,
    pub workers: usize,
    pub default_exchange: String,
    pub rule: ScreeningRule,
    pub universe_file: Option<PathBuf>,
    pub symbols: Option<String>,
    pub market_data_url: Url,
    pub market_feed_url: Url,
    pub api_token: Option<String>,
    pub feed_buffer: usize,
    pub feed_connect_timeout: Duration,
    pub exit_when_idle: bool,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Daily,
            bars: DEFAULT_BARS,
            workers: DEFAULT_WORKERS,
            default_exchange: DEFAULT_EXCHANGE.to_string(),
            rule: ScreeningRule::default(),
            universe_file: None,
            symbols: None,
            market_data_url: Url::parse(DEFAULT_MARKET_DATA_URL).expect("valid default URL"),
            market_feed_url: Url::parse(DEFAULT_MARKET_FEED_URL).expect("valid default URL"),
            api_token: None,
            feed_buffer: DEFAULT_FEED_BUFFER,
            feed_connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            exit_when_idle: false,
        }
    }
}

impl ScreenerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let interval = match get("SCREEN_INTERVAL") {
            Some(raw) => Interval::from_str(&raw).map_err(|reason| ConfigError::InvalidValue {
                key: "SCREEN_INTERVAL",
                value: raw.clone(),
                reason,
            })?,
            None => defaults.interval,
        };

        let bars = parse_in_range("SCREEN_BARS", get("SCREEN_BARS"), defaults.bars, 1, MAX_BARS)?;
        let workers = parse_in_range(
            "SCREEN_WORKERS",
            get("SCREEN_WORKERS"),
            defaults.workers,
            1,
            MAX_WORKERS,
        )?;

        let periods = IndicatorPeriods {
            short_ma: parse_in_range(
                "SHORT_MA_PERIOD",
                get("SHORT_MA_PERIOD"),
                defaults.rule.periods.short_ma,
                1,
                MAX_PERIOD,
            )?,
            long_ma: parse_in_range(
                "LONG_MA_PERIOD",
                get("LONG_MA_PERIOD"),
                defaults.rule.periods.long_ma,
                1,
                MAX_PERIOD,
            )?,
            rsi: parse_in_range(
                "RSI_PERIOD",
                get("RSI_PERIOD"),
                defaults.rule.periods.rsi,
                1,
                MAX_PERIOD,
            )?,
        };

        let rule = ScreeningRule {
            periods,
            high_proximity: parse_in_range(
                "HIGH_PROXIMITY",
                get("HIGH_PROXIMITY"),
                defaults.rule.high_proximity,
                0.0,
                1.0,
            )?,
            overbought: parse_in_range(
                "RSI_OVERBOUGHT",
                get("RSI_OVERBOUGHT"),
                defaults.rule.overbought,
                0.0,
                100.0,
            )?,
        };

        let market_data_url = parse_url("MARKET_DATA_URL", get("MARKET_DATA_URL"), defaults.market_data_url)?;
        let market_feed_url = parse_url("MARKET_FEED_URL", get("MARKET_FEED_URL"), defaults.market_feed_url)?;

        Ok(Self {
            interval,
            bars,
            workers,
            default_exchange: get("DEFAULT_EXCHANGE").unwrap_or(defaults.default_exchange),
            rule,
            universe_file: get("UNIVERSE_FILE").map(PathBuf::from),
            symbols: get("SYMBOLS"),
            market_data_url,
            market_feed_url,
            api_token: get("MARKET_DATA_TOKEN"),
            feed_buffer: parse_in_range(
                "FEED_BUFFER",
                get("FEED_BUFFER"),
                defaults.feed_buffer,
                1,
                MAX_FEED_BUFFER,
            )?,
            feed_connect_timeout: Duration::from_secs(parse_in_range(
                "FEED_CONNECT_TIMEOUT",
                get("FEED_CONNECT_TIMEOUT"),
                defaults.feed_connect_timeout.as_secs(),
                1,
                MAX_CONNECT_TIMEOUT_SECS,
            )?),
            exit_when_idle: parse_or("EXIT_WHEN_IDLE", get("EXIT_WHEN_IDLE"), defaults.exit_when_idle)?,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_in_range<T>(
    key: &'static str,
    raw: Option<String>,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
    T::Err: fmt::Display,
{
    let value = parse_or(key, raw, default)?;
    // written so NaN is rejected too
    if !(value >= min && value <= max) {
        return Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: format!("must be between {} and {}", min, max),
        });
    }
    Ok(value)
}

fn parse_url(key: &'static str, raw: Option<String>, default: Url) -> Result<Url, ConfigError> {
    match raw {
        Some(raw) => Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
