//! Market data boundaries consumed by the screener and the subscription manager.

use crate::error::{FeedError, ProviderError};
use crate::models::market::{Bar, Interval, Symbol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Historical OHLCV source
///
/// Implementations must tolerate concurrent calls for different symbols.
#[async_trait]
pub trait TimeSeriesProvider: Send + Sync {
    /// Fetch up to `bars` bars for `symbol`, oldest first
    async fn fetch(
        &self,
        symbol: &Symbol,
        interval: Interval,
        bars: usize,
    ) -> Result<Vec<Bar>, ProviderError>;
}

/// New data pushed by a live feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedUpdate {
    pub symbol: Symbol,
    pub interval: Interval,
    pub bars: Vec<Bar>,
}

/// Source of live feeds, one per symbol
#[async_trait]
pub trait LiveFeed: Send + Sync {
    async fn open(
        &self,
        symbol: &Symbol,
        interval: Interval,
    ) -> Result<Box<dyn FeedHandle>, FeedError>;
}

/// An open live feed for one symbol
///
/// Updates are delivered to the attached sender. Delivery must never wait on
/// the receiving side; an update that does not fit is dropped by the feed.
#[async_trait]
pub trait FeedHandle: Send + Sync {
    async fn attach(&mut self, sink: mpsc::Sender<FeedUpdate>) -> Result<(), FeedError>;

    async fn detach(&mut self) -> Result<(), FeedError>;

    async fn close(&mut self) -> Result<(), FeedError>;
}
