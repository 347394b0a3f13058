//! JSON shapes exchanged with the market data service

use crate::models::market::{Bar, Interval, Symbol};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Bar as sent on the wire, timestamp in epoch milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBar {
    #[serde(rename = "t")]
    pub time: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
}

impl WireBar {
    pub fn into_bar(self) -> Result<Bar, String> {
        let timestamp = DateTime::from_timestamp_millis(self.time)
            .ok_or_else(|| format!("timestamp {} out of range", self.time))?;
        Ok(Bar::new(
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            timestamp,
        ))
    }
}

/// Requests sent on a live feed connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum ControlMessage {
    Subscribe {
        symbol: String,
        exchange: String,
        interval: Interval,
    },
    Unsubscribe {
        symbol: String,
        exchange: String,
        interval: Interval,
    },
}

impl ControlMessage {
    pub fn subscribe(symbol: &Symbol, interval: Interval) -> Self {
        ControlMessage::Subscribe {
            symbol: symbol.ticker.clone(),
            exchange: symbol.exchange.clone(),
            interval,
        }
    }

    pub fn unsubscribe(symbol: &Symbol, interval: Interval) -> Self {
        ControlMessage::Unsubscribe {
            symbol: symbol.ticker.clone(),
            exchange: symbol.exchange.clone(),
            interval,
        }
    }
}

/// New bars pushed by the live feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    pub bars: Vec<WireBar>,
}

impl StreamMessage {
    /// Whether this message belongs to `symbol`
    pub fn is_for(&self, symbol: &Symbol) -> bool {
        self.symbol == symbol.ticker
            && self
                .exchange
                .as_deref()
                .map_or(true, |exchange| exchange == symbol.exchange)
    }
}
