//! Error types shared across the screening and streaming phases

use thiserror::Error;

/// Failures reported by a time series provider
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider answered but has no bars for the symbol
    #[error("no data available for {symbol}")]
    NoData { symbol: String },

    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded into bars
    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// A bar sequence that cannot back indicator computation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("bar {index} is not after the previous bar ({timestamp})")]
    NotAscending { index: usize, timestamp: String },

    #[error("bar {index} has a non-finite {field}")]
    NonFinite { index: usize, field: &'static str },
}

/// Failures of the live feed boundary
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeedError {
    #[error("failed to connect feed: {0}")]
    Connect(String),

    #[error("feed protocol error: {0}")]
    Protocol(String),

    #[error("consumer already attached")]
    AlreadyAttached,

    #[error("no consumer attached")]
    NotAttached,

    #[error("feed already closed")]
    Closed,
}

/// Failures of the subscription lifecycle
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubscriptionError {
    #[error("shutdown in progress, not subscribing to {symbol}")]
    ShuttingDown { symbol: String },

    #[error("failed to open feed for {symbol}: {source}")]
    Open { symbol: String, source: FeedError },

    #[error("failed to attach consumer for {symbol}: {source}")]
    Attach { symbol: String, source: FeedError },
}

/// Startup failures; the only class that aborts a run
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("instrument universe is empty")]
    EmptyUniverse,

    #[error("failed to read universe file {path}: {source}")]
    UniverseRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse universe file {path}: {reason}")]
    UniverseParse { path: String, reason: String },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("provider initialisation failed: {0}")]
    Provider(String),
}
