//! HTTP history provider
//!
//! `GET {base}/history?symbol=..&exchange=..&interval=..&bars=..` answering a
//! JSON array of bars.

use crate::error::{ConfigError, ProviderError};
use crate::models::market::{Bar, Interval, Symbol};
use crate::services::market_data::TimeSeriesProvider;
use crate::services::messages::WireBar;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: usize = 3;

pub struct RestMarketDataProvider {
    base_url: Url,
    client: reqwest::Client,
    token: Option<String>,
    max_retries: usize,
}

impl RestMarketDataProvider {
    pub fn new(base_url: Url, token: Option<String>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Provider(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(base_url, client).with_token(token))
    }

    pub fn with_client(mut base_url: Url, client: reqwest::Client) -> Self {
        // join() would replace the last path segment without this
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            client,
            token: None,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn request(
        &self,
        symbol: &Symbol,
        interval: Interval,
        bars: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let url = self
            .base_url
            .join("history")
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let bars = bars.to_string();

        let mut request = self.client.get(url).query(&[
            ("symbol", symbol.ticker.as_str()),
            ("exchange", symbol.exchange.as_str()),
            ("interval", interval.as_str()),
            ("bars", bars.as_str()),
        ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Vec<WireBar> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if raw.is_empty() {
            return Err(ProviderError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let mut bars = raw
            .into_iter()
            .map(WireBar::into_bar)
            .collect::<Result<Vec<Bar>, String>>()
            .map_err(ProviderError::Decode)?;
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::Transport(_) => true,
        ProviderError::Status { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

#[async_trait]
impl TimeSeriesProvider for RestMarketDataProvider {
    async fn fetch(
        &self,
        symbol: &Symbol,
        interval: Interval,
        bars: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_times(self.max_retries);

        let result = (|| self.request(symbol, interval, bars))
            .retry(backoff)
            .when(is_transient)
            .notify(|e: &ProviderError, after: Duration| {
                warn!(symbol = %symbol, error = %e, "Fetch for {} failed, retrying in {:?}", symbol, after);
            })
            .await;

        if let Ok(bars) = &result {
            debug!(symbol = %symbol, count = bars.len(), "Fetched {} bars for {}", bars.len(), symbol);
        }
        result
    }
}
