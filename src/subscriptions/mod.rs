//! Live subscriptions for screened symbols
//!
//! Each subscription owns one open feed handle and one consumer task. The feed
//! pushes updates onto a bounded channel; the consumer task drains it and runs
//! the user callback, so a slow callback only delays its own symbol.

pub mod consumer;

use crate::core::runtime::RunState;
use crate::error::{FeedError, SubscriptionError};
use crate::models::market::{Interval, Symbol};
use crate::services::market_data::{FeedHandle, FeedUpdate, LiveFeed};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use consumer::{LoggingConsumer, UpdateConsumer};

pub const DEFAULT_FEED_BUFFER: usize = 256;
pub const MAX_FEED_BUFFER: usize = 1 << 20;
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Public view of an open subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub symbol: Symbol,
    pub interval: Interval,
    pub opened_at: DateTime<Utc>,
}

/// One open feed plus the task consuming it
struct Subscription {
    id: u64,
    info: SubscriptionInfo,
    handle: Box<dyn FeedHandle>,
    consumer: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<Symbol, Subscription>>>;

/// Outcome of tearing down a set of subscriptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    /// Every symbol whose teardown was attempted
    pub closed: Vec<Symbol>,
    /// Errors hit along the way; teardown continued past each of them
    pub errors: Vec<(Symbol, FeedError)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Registry of live subscriptions, at most one per symbol
pub struct SubscriptionManager {
    feed: Arc<dyn LiveFeed>,
    consumer: Arc<dyn UpdateConsumer>,
    interval: Interval,
    run_state: RunState,
    buffer: usize,
    drain_timeout: Duration,
    next_id: AtomicU64,
    subscriptions: Registry,
}

impl SubscriptionManager {
    pub fn new(
        feed: Arc<dyn LiveFeed>,
        consumer: Arc<dyn UpdateConsumer>,
        interval: Interval,
        run_state: RunState,
    ) -> Self {
        Self {
            feed,
            consumer,
            interval,
            run_state,
            buffer: DEFAULT_FEED_BUFFER,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            next_id: AtomicU64::new(0),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Capacity of each subscription's update channel, clamped to `1..=MAX_FEED_BUFFER`
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.clamp(1, MAX_FEED_BUFFER);
        self
    }

    /// How long teardown waits for a consumer task to finish
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Open a live feed for `symbol` unless one is already open
    ///
    /// The registry lock is held while the feed opens, so concurrent calls for
    /// the same symbol still produce a single feed. A stop request abandons an
    /// open still in progress, which releases the lock for teardown.
    pub async fn subscribe(&self, symbol: &Symbol) -> Result<SubscriptionInfo, SubscriptionError> {
        if self.run_state.is_stopping() {
            return Err(self.reject(symbol));
        }

        let mut subscriptions = self.subscriptions.lock().await;
        // Shutdown may have started while we waited for the lock
        if self.run_state.is_stopping() {
            return Err(self.reject(symbol));
        }

        if let Some(existing) = subscriptions.get(symbol) {
            debug!(symbol = %symbol, "Already subscribed to {}", symbol);
            return Ok(existing.info.clone());
        }

        let opened = tokio::select! {
            opened = self.feed.open(symbol, self.interval) => opened,
            _ = self.run_state.wait_for_stop() => {
                info!(symbol = %symbol, "Shutdown requested while opening feed for {}", symbol);
                return Err(self.reject(symbol));
            }
        };
        let mut handle = opened.map_err(|source| {
            error!(symbol = %symbol, error = %source, "Failed to open feed for {}: {}", symbol, source);
            SubscriptionError::Open {
                symbol: symbol.to_string(),
                source,
            }
        })?;

        let (tx, rx) = mpsc::channel(self.buffer);
        if let Err(source) = handle.attach(tx).await {
            error!(symbol = %symbol, error = %source, "Failed to attach consumer for {}: {}", symbol, source);
            if let Err(e) = handle.close().await {
                warn!(symbol = %symbol, error = %e, "Failed to close feed for {}: {}", symbol, e);
            }
            return Err(SubscriptionError::Attach {
                symbol: symbol.to_string(),
                source,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let consumer = tokio::spawn(consume(
            symbol.clone(),
            id,
            rx,
            self.consumer.clone(),
            Arc::downgrade(&self.subscriptions),
        ));
        let info = SubscriptionInfo {
            symbol: symbol.clone(),
            interval: self.interval,
            opened_at: Utc::now(),
        };
        subscriptions.insert(
            symbol.clone(),
            Subscription {
                id,
                info: info.clone(),
                handle,
                consumer,
            },
        );

        info!(symbol = %symbol, interval = %self.interval, "Subscribed to {} at {}", symbol, self.interval);
        Ok(info)
    }

    /// Tear down the subscription for `symbol`, if any
    pub async fn unsubscribe(&self, symbol: &Symbol) -> Option<Vec<FeedError>> {
        let subscription = self.subscriptions.lock().await.remove(symbol)?;
        Some(self.teardown(subscription).await)
    }

    /// Tear down every open subscription
    ///
    /// Each subscription is detached and closed even when an earlier step or an
    /// earlier subscription failed.
    pub async fn unsubscribe_all(&self) -> TeardownReport {
        let mut drained: Vec<Subscription> = {
            let mut subscriptions = self.subscriptions.lock().await;
            subscriptions.drain().map(|(_, s)| s).collect()
        };
        drained.sort_by(|a, b| a.info.symbol.cmp(&b.info.symbol));

        info!(count = drained.len(), "Tearing down {} subscriptions", drained.len());

        let mut report = TeardownReport::default();
        for subscription in drained {
            let symbol = subscription.info.symbol.clone();
            for e in self.teardown(subscription).await {
                report.errors.push((symbol.clone(), e));
            }
            report.closed.push(symbol);
        }
        report
    }

    /// Symbols with an open subscription, sorted
    pub async fn active(&self) -> Vec<Symbol> {
        let subscriptions = self.subscriptions.lock().await;
        let mut symbols: Vec<Symbol> = subscriptions.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.lock().await.is_empty()
    }

    fn reject(&self, symbol: &Symbol) -> SubscriptionError {
        warn!(symbol = %symbol, phase = %self.run_state.phase(), "Not subscribing to {}: shutting down", symbol);
        SubscriptionError::ShuttingDown {
            symbol: symbol.to_string(),
        }
    }

    async fn teardown(&self, subscription: Subscription) -> Vec<FeedError> {
        let Subscription {
            info,
            mut handle,
            mut consumer,
            ..
        } = subscription;
        let symbol = info.symbol;
        let mut errors = Vec::new();

        match handle.detach().await {
            Ok(()) => debug!(symbol = %symbol, "Detached consumer for {}", symbol),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to detach consumer for {}: {}", symbol, e);
                errors.push(e);
            }
        }

        match handle.close().await {
            Ok(()) => debug!(symbol = %symbol, "Closed feed for {}", symbol),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to close feed for {}: {}", symbol, e);
                errors.push(e);
            }
        }

        match tokio::time::timeout(self.drain_timeout, &mut consumer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(symbol = %symbol, error = %e, "Consumer task for {} failed: {}", symbol, e);
            }
            Err(_) => {
                warn!(symbol = %symbol, "Consumer task for {} did not drain in time, aborting", symbol);
                consumer.abort();
            }
        }

        info!(symbol = %symbol, "Unsubscribed from {}", symbol);
        errors
    }
}

/// Drain one subscription's updates into the consumer
///
/// The channel closes either because teardown detached it or because the feed
/// died. In the second case the entry is still registered under `id`, so it is
/// removed here and its feed closed.
async fn consume(
    symbol: Symbol,
    id: u64,
    mut updates: mpsc::Receiver<FeedUpdate>,
    consumer: Arc<dyn UpdateConsumer>,
    registry: Weak<Mutex<HashMap<Symbol, Subscription>>>,
) {
    while let Some(update) = updates.recv().await {
        consumer.on_update(&update);
    }
    debug!(symbol = %symbol, "Update stream for {} ended", symbol);

    let Some(registry) = registry.upgrade() else {
        return;
    };
    let orphaned = {
        let mut subscriptions = registry.lock().await;
        match subscriptions.get(&symbol) {
            Some(current) if current.id == id => subscriptions.remove(&symbol),
            _ => None,
        }
    };
    let Some(subscription) = orphaned else {
        return;
    };

    warn!(symbol = %symbol, "Feed for {} ended, dropping subscription", symbol);
    let mut handle = subscription.handle;
    if let Err(e) = handle.close().await {
        debug!(symbol = %symbol, error = %e, "Closing dead feed for {}: {}", symbol, e);
    }
}
