//! Market data boundaries and the adapters that implement them.

pub mod market_data;
pub mod messages;
pub mod rest;
pub mod stream;

pub use market_data::{FeedHandle, FeedUpdate, LiveFeed, TimeSeriesProvider};
pub use rest::RestMarketDataProvider;
pub use stream::WebSocketFeed;
