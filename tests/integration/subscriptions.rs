//! Subscription lifecycle against the in-memory feed

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use trendscreen::core::RunState;
use trendscreen::models::Interval;
use trendscreen::services::FeedUpdate;
use trendscreen::subscriptions::{SubscriptionManager, UpdateConsumer};
use trendscreen::{FeedError, SubscriptionError};

use crate::test_utils::{nse, update, wait_until, FakeFeed, RecordingConsumer};

fn manager(
    feed: Arc<FakeFeed>,
    consumer: Arc<dyn UpdateConsumer>,
    run_state: RunState,
) -> SubscriptionManager {
    SubscriptionManager::new(feed, consumer, Interval::Daily, run_state)
        .with_drain_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn subscribe_is_idempotent() {
    let feed = Arc::new(FakeFeed::new());
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), RunState::new());

    let first = assert_ok!(manager.subscribe(&nse("TCS")).await);
    let second = assert_ok!(manager.subscribe(&nse("TCS")).await);

    assert_eq!(first, second);
    assert_eq!(feed.log().opened, vec![nse("TCS")]);
    assert_eq!(manager.active().await, vec![nse("TCS")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribes_open_one_feed() {
    let feed = Arc::new(FakeFeed::new().with_open_delay(Duration::from_millis(20)));
    let manager = Arc::new(manager(
        feed.clone(),
        Arc::new(RecordingConsumer::default()),
        RunState::new(),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.subscribe(&nse("INFY")).await })
        })
        .collect();
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    assert_eq!(feed.log().opened.len(), 1);
    assert_eq!(manager.len().await, 1);
}

#[tokio::test]
async fn updates_reach_the_consumer() {
    let feed = Arc::new(FakeFeed::new());
    let consumer = Arc::new(RecordingConsumer::default());
    let manager = manager(feed.clone(), consumer.clone(), RunState::new());

    assert_ok!(manager.subscribe(&nse("TCS")).await);
    assert!(feed.push(update(&nse("TCS"), 101.0)));
    assert!(feed.push(update(&nse("TCS"), 102.0)));

    assert!(wait_until(Duration::from_secs(1), || consumer.received().len() == 2).await);
    let closes: Vec<f64> = consumer
        .received()
        .iter()
        .map(|u| u.bars[0].close)
        .collect();
    assert_eq!(closes, vec![101.0, 102.0]);
}

#[tokio::test]
async fn subscribe_rejected_once_stopping() {
    let feed = Arc::new(FakeFeed::new());
    let run_state = RunState::new();
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), run_state.clone());

    run_state.request_stop();
    let err = assert_err!(manager.subscribe(&nse("TCS")).await);

    assert!(matches!(err, SubscriptionError::ShuttingDown { .. }));
    assert!(feed.log().opened.is_empty());
    assert!(manager.is_empty().await);
}

#[tokio::test]
async fn open_failure_leaves_no_subscription() {
    let feed = Arc::new(FakeFeed::new().failing_open("BAD"));
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), RunState::new());

    let err = assert_err!(manager.subscribe(&nse("BAD")).await);
    assert!(matches!(
        err,
        SubscriptionError::Open {
            source: FeedError::Connect(_),
            ..
        }
    ));
    assert!(manager.is_empty().await);
}

#[tokio::test]
async fn attach_failure_closes_the_feed() {
    let feed = Arc::new(FakeFeed::new().failing_attach("BAD"));
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), RunState::new());

    let err = assert_err!(manager.subscribe(&nse("BAD")).await);

    assert!(matches!(err, SubscriptionError::Attach { .. }));
    assert_eq!(feed.log().closed, vec![nse("BAD")]);
    assert!(manager.is_empty().await);
}

#[tokio::test]
async fn detach_failure_still_closes() {
    let feed = Arc::new(FakeFeed::new().failing_detach("BAD"));
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), RunState::new());

    assert_ok!(manager.subscribe(&nse("BAD")).await);
    assert_ok!(manager.subscribe(&nse("GOOD")).await);

    let report = manager.unsubscribe_all().await;

    assert_eq!(report.closed, vec![nse("BAD"), nse("GOOD")]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, nse("BAD"));
    assert!(!report.is_clean());

    let log = feed.log();
    assert_eq!(log.closed, vec![nse("BAD"), nse("GOOD")]);
    assert_eq!(log.detached, vec![nse("GOOD")]);
    assert!(manager.is_empty().await);
}

#[tokio::test]
async fn unsubscribe_single_symbol() {
    let feed = Arc::new(FakeFeed::new());
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), RunState::new());

    assert_ok!(manager.subscribe(&nse("TCS")).await);
    assert_ok!(manager.subscribe(&nse("INFY")).await);

    assert_eq!(manager.unsubscribe(&nse("TCS")).await, Some(vec![]));
    assert_eq!(manager.unsubscribe(&nse("TCS")).await, None);
    assert_eq!(manager.active().await, vec![nse("INFY")]);
    assert!(!feed.push(update(&nse("TCS"), 1.0)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_consumer_does_not_stall_other_symbols() {
    let feed = Arc::new(FakeFeed::new());
    let fast_seen = Arc::new(Mutex::new(Vec::new()));
    let seen = fast_seen.clone();
    let consumer = Arc::new(move |update: &FeedUpdate| {
        if update.symbol.ticker == "SLOW" {
            std::thread::sleep(Duration::from_millis(300));
        } else {
            seen.lock().unwrap().push(update.symbol.clone());
        }
    });
    let manager = SubscriptionManager::new(feed.clone(), consumer, Interval::Daily, RunState::new())
        .with_buffer(1)
        .with_drain_timeout(Duration::from_millis(50));

    assert_ok!(manager.subscribe(&nse("SLOW")).await);
    assert_ok!(manager.subscribe(&nse("FAST")).await);

    // a full buffer drops the update instead of blocking the feed
    let delivered = (0..5)
        .filter(|i| feed.push(update(&nse("SLOW"), *i as f64)))
        .count();
    assert!(delivered < 5);

    assert!(feed.push(update(&nse("FAST"), 1.0)));
    assert!(
        wait_until(Duration::from_millis(150), || fast_seen.lock().unwrap().len() == 1).await
    );

    let report = manager.unsubscribe_all().await;
    assert_eq!(report.closed.len(), 2);
}

#[tokio::test]
async fn dead_feed_is_dropped_and_can_be_resubscribed() {
    let feed = Arc::new(FakeFeed::new());
    let manager = manager(feed.clone(), Arc::new(RecordingConsumer::default()), RunState::new());

    assert_ok!(manager.subscribe(&nse("TCS")).await);
    assert_ok!(manager.subscribe(&nse("INFY")).await);
    assert!(feed.kill(&nse("TCS")));

    let mut dropped = false;
    for _ in 0..100 {
        if manager.active().await == vec![nse("INFY")] {
            dropped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(dropped, "dead feed still listed as active");
    assert!(wait_until(Duration::from_secs(1), || feed.log().closed == vec![nse("TCS")]).await);

    assert_ok!(manager.subscribe(&nse("TCS")).await);
    assert_eq!(feed.log().opened.len(), 3);
    assert_eq!(manager.len().await, 2);
}

#[tokio::test]
async fn stop_abandons_a_stalled_open() {
    let feed = Arc::new(FakeFeed::new().with_open_delay(Duration::from_secs(60)));
    let run_state = RunState::new();
    let manager = Arc::new(manager(
        feed.clone(),
        Arc::new(RecordingConsumer::default()),
        run_state.clone(),
    ));

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.subscribe(&nse("TCS")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    run_state.request_stop();

    let report = tokio::time::timeout(Duration::from_secs(2), manager.unsubscribe_all())
        .await
        .expect("teardown must not wait on a stalled open");
    assert!(report.closed.is_empty());

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("subscribe should return once stopping")
        .unwrap();
    assert!(matches!(result, Err(SubscriptionError::ShuttingDown { .. })));
    assert!(feed.log().opened.is_empty());
    assert!(manager.is_empty().await);
}
