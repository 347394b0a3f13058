//! trendscreen screener
//!
//! Screens the configured universe once, subscribes to live updates for the
//! symbols that pass, and streams until interrupted.

use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};
use trendscreen::config::{get_environment, ScreenerConfig};
use trendscreen::core::{listen_for_signals, RunState, ShutdownCoordinator};
use trendscreen::logging;
use trendscreen::screening::BatchScreener;
use trendscreen::services::{RestMarketDataProvider, WebSocketFeed};
use trendscreen::subscriptions::{LoggingConsumer, SubscriptionManager};
use trendscreen::universe;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let env = get_environment();
    info!("Starting trendscreen screener");
    info!(environment = %env, "Environment");

    let config = ScreenerConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration: {}", e);
        e
    })?;

    let symbols = universe::load_universe(&config).map_err(|e| {
        error!(error = %e, "Error loading stock symbols: {}", e);
        e
    })?;
    info!(count = symbols.len(), "Loaded {} symbols", symbols.len());

    info!(url = %config.market_data_url, "Initializing market data provider...");
    let provider = RestMarketDataProvider::new(config.market_data_url.clone(), config.api_token.clone())
        .map_err(|e| {
            error!(error = %e, "Failed to initialize market data provider: {}", e);
            e
        })?;
    info!("Market data provider initialized");

    let run_state = RunState::new();
    tokio::spawn(listen_for_signals(run_state.clone()));

    let feed = WebSocketFeed::new(config.market_feed_url.clone())
        .with_token(config.api_token.clone())
        .with_connect_timeout(config.feed_connect_timeout);
    let subscriptions = Arc::new(
        SubscriptionManager::new(
            Arc::new(feed),
            Arc::new(LoggingConsumer),
            config.interval,
            run_state.clone(),
        )
        .with_buffer(config.feed_buffer),
    );
    let coordinator = ShutdownCoordinator::new(run_state.clone(), subscriptions.clone());

    let screener = BatchScreener::new(Arc::new(provider), config.rule, config.interval, run_state.clone())
        .with_workers(config.workers)
        .with_bars(config.bars);
    info!(workers = screener.workers(), "Screening with {} workers", screener.workers());
    let report = screener.screen(&symbols).await;
    let selected = report.passing();

    let rule = screener.rule();
    let periods = rule.periods;
    info!(
        count = selected.len(),
        "Stocks with price above the {} and {} bar MAs, within {:.1}% of the day's high, RSI below {} and above-average volume: {:?}",
        periods.short_ma,
        periods.long_ma,
        (1.0 - rule.high_proximity) * 100.0,
        rule.overbought,
        selected.iter().map(|s| s.to_string()).collect::<Vec<_>>()
    );

    for symbol in &selected {
        if run_state.is_stopping() {
            warn!("Shutdown requested, skipping remaining subscriptions");
            break;
        }
        if let Err(e) = subscriptions.subscribe(symbol).await {
            error!(symbol = %symbol, error = %e, "Failed to subscribe to {}: {}", symbol, e);
        }
    }

    let active = subscriptions.len().await;
    let teardown = if active == 0 && config.exit_when_idle {
        info!("No live subscriptions, exiting");
        coordinator.shutdown().await
    } else {
        info!(active = active, "Streaming {} symbols. Waiting for shutdown signal...", active);
        coordinator.run().await
    };

    for (symbol, e) in &teardown.errors {
        warn!(symbol = %symbol, error = %e, "Teardown error for {}: {}", symbol, e);
    }
    info!("Screener stopped");
    Ok(())
}
