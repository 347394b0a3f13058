//! trendscreen: screen an instrument universe against a trend rule, then stream the survivors.

pub mod config;
pub mod core;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod screening;
pub mod services;
pub mod subscriptions;
pub mod universe;

pub use error::{ConfigError, FeedError, ProviderError, SeriesError, SubscriptionError};
