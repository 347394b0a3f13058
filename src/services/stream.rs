//! WebSocket live feed
//!
//! One connection per subscribed symbol. A reader task forwards parsed bars to
//! the attached consumer with `try_send`, so a slow or missing consumer never
//! stalls the socket. When the server goes away the reader drops the attached
//! sender, which ends the consumer's stream.

use crate::error::FeedError;
use crate::models::market::{Interval, Symbol};
use crate::services::market_data::{FeedHandle, FeedUpdate, LiveFeed};
use crate::services::messages::{ControlMessage, StreamMessage, WireBar};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpdateSink = Arc<Mutex<SinkSlot>>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Consumer side of a connection; `ended` is set once the reader has stopped
#[derive(Default)]
struct SinkSlot {
    tx: Option<mpsc::Sender<FeedUpdate>>,
    ended: bool,
}

pub struct WebSocketFeed {
    url: Url,
    token: Option<String>,
    connect_timeout: Duration,
}

impl WebSocketFeed {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Bound on connecting, the handshake and the subscribe message together
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn connect(
        &self,
        symbol: &Symbol,
        interval: Interval,
    ) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), FeedError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| FeedError::Connect(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        let (mut write, read) = stream.split();

        send_control(&mut write, &ControlMessage::subscribe(symbol, interval)).await?;
        Ok((write, read))
    }
}

#[async_trait]
impl LiveFeed for WebSocketFeed {
    async fn open(
        &self,
        symbol: &Symbol,
        interval: Interval,
    ) -> Result<Box<dyn FeedHandle>, FeedError> {
        let (write, read) = tokio::time::timeout(self.connect_timeout, self.connect(symbol, interval))
            .await
            .map_err(|_| {
                FeedError::Connect(format!(
                    "feed not established within {:?}",
                    self.connect_timeout
                ))
            })??;
        debug!(symbol = %symbol, interval = %interval, "Sent feed subscription for {}", symbol);

        let sink: UpdateSink = Arc::new(Mutex::new(SinkSlot::default()));
        let reader = tokio::spawn(read_updates(symbol.clone(), interval, read, sink.clone()));

        Ok(Box::new(WebSocketFeedHandle {
            symbol: symbol.clone(),
            interval,
            write: Mutex::new(Some(write)),
            sink,
            reader: Some(reader),
        }))
    }
}

struct WebSocketFeedHandle {
    symbol: Symbol,
    interval: Interval,
    write: Mutex<Option<SplitSink<WsStream, Message>>>,
    sink: UpdateSink,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl FeedHandle for WebSocketFeedHandle {
    async fn attach(&mut self, sink: mpsc::Sender<FeedUpdate>) -> Result<(), FeedError> {
        if self.write.get_mut().is_none() {
            return Err(FeedError::Closed);
        }
        let mut slot = self.sink.lock().await;
        if slot.ended {
            return Err(FeedError::Closed);
        }
        if slot.tx.is_some() {
            return Err(FeedError::AlreadyAttached);
        }
        slot.tx = Some(sink);
        Ok(())
    }

    async fn detach(&mut self) -> Result<(), FeedError> {
        match self.sink.lock().await.tx.take() {
            Some(_) => Ok(()),
            None => Err(FeedError::NotAttached),
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        let Some(mut write) = self.write.get_mut().take() else {
            return Err(FeedError::Closed);
        };
        self.sink.lock().await.tx.take();

        let unsubscribe = send_control(
            &mut write,
            &ControlMessage::unsubscribe(&self.symbol, self.interval),
        )
        .await;
        let close = write
            .close()
            .await
            .map_err(|e| FeedError::Protocol(e.to_string()));

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        unsubscribe.and(close)
    }
}

impl Drop for WebSocketFeedHandle {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn send_control(
    write: &mut SplitSink<WsStream, Message>,
    message: &ControlMessage,
) -> Result<(), FeedError> {
    let json = serde_json::to_string(message).map_err(|e| FeedError::Protocol(e.to_string()))?;
    write
        .send(Message::Text(json))
        .await
        .map_err(|e| FeedError::Protocol(e.to_string()))
}

async fn read_updates(
    symbol: Symbol,
    interval: Interval,
    mut read: SplitStream<WsStream>,
    sink: UpdateSink,
) {
    while let Some(message) = read.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!(symbol = %symbol, "Feed for {} closed by server", symbol);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Feed for {} failed: {}", symbol, e);
                break;
            }
        };

        let message: StreamMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Ignoring unrecognised feed message: {}", text);
                continue;
            }
        };
        if !message.is_for(&symbol) {
            continue;
        }

        let update = FeedUpdate {
            symbol: symbol.clone(),
            interval: message.interval.unwrap_or(interval),
            bars: message
                .bars
                .into_iter()
                .filter_map(|bar| match WireBar::into_bar(bar) {
                    Ok(bar) => Some(bar),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Dropping malformed bar for {}: {}", symbol, e);
                        None
                    }
                })
                .collect(),
        };

        let slot = sink.lock().await;
        match slot.tx.as_ref() {
            Some(tx) => match tx.try_send(update) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(symbol = %symbol, "Consumer for {} is lagging, dropping update", symbol);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(symbol = %symbol, "Consumer for {} is gone, dropping update", symbol);
                }
            },
            None => debug!(symbol = %symbol, "No consumer attached for {}, dropping update", symbol),
        }
    }

    let mut slot = sink.lock().await;
    slot.ended = true;
    if slot.tx.take().is_some() {
        warn!(symbol = %symbol, "Feed for {} ended, notifying consumer", symbol);
    }
}
