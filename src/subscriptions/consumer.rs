//! Consumers of live feed updates

use crate::services::market_data::FeedUpdate;
use tracing::info;

/// User logic invoked for every update of a subscription
///
/// Called from the subscription's own consumer task, never from the feed's
/// delivery path.
pub trait UpdateConsumer: Send + Sync {
    fn on_update(&self, update: &FeedUpdate);
}

impl<F> UpdateConsumer for F
where
    F: Fn(&FeedUpdate) + Send + Sync,
{
    fn on_update(&self, update: &FeedUpdate) {
        self(update)
    }
}

/// Logs each update with its symbol, exchange and interval
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingConsumer;

impl UpdateConsumer for LoggingConsumer {
    fn on_update(&self, update: &FeedUpdate) {
        info!(
            symbol = %update.symbol.ticker,
            exchange = %update.symbol.exchange,
            interval = %update.interval,
            bars = update.bars.len(),
            "Received new data for {} on {} at {}",
            update.symbol.ticker,
            update.symbol.exchange,
            update.interval
        );
        for bar in &update.bars {
            info!(
                symbol = %update.symbol.ticker,
                timestamp = %bar.timestamp,
                open = bar.open,
                high = bar.high,
                low = bar.low,
                close = bar.close,
                volume = bar.volume,
                "{} {} O:{} H:{} L:{} C:{} V:{}",
                update.symbol.ticker,
                bar.timestamp,
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            );
        }
    }
}
