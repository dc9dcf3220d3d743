//! Typed market-data sequences for one symbol.
//!
//! [`BinanceFeed`] opens an independent [`Transport`] per stream and runs a
//! decode task between the raw frame sink and the typed [`Subscription`]
//! handed to the caller. Frames that fail to decode are logged and dropped;
//! the sequence itself only ends when its transport gives up.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::Result;
use crate::config::BinanceConfig;
use crate::models::{DecodeError, DepthDiff, Trade, decode_depth, decode_trade};
use crate::tls::load_tls_config;
use crate::websocket::{Dialer, SocketOptions, Transport, WsDialer};

/// Default public stream endpoint.
pub const BINANCE_STREAM_URL: &str = "wss://stream.binance.com:9443";

/// Raw frames buffered between a transport and its decode task.
const FRAME_QUEUE_DEPTH: usize = 32;

/// Decoded records buffered between a decode task and the consumer.
const RECORD_QUEUE_DEPTH: usize = 32;

/// Source of trade and depth-diff sequences for a single symbol.
///
/// Each call opens a fresh connection. An `Err` means the initial dial
/// failed; later failures end the returned sequence instead.
pub trait MarketFeed: Send + Sync + 'static {
    fn symbol(&self) -> &str;

    fn trades(&self) -> impl Future<Output = Result<Subscription<Trade>>> + Send;

    fn depth_updates(&self) -> impl Future<Output = Result<Subscription<DepthDiff>>> + Send;
}

/// Lazy, finite sequence of decoded records.
///
/// Once [`next`](Subscription::next) returns `None` it never yields again.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Wraps the receiving half of a record channel.
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Waits for the next record, or `None` once the sequence has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Feed over the Binance public WebSocket streams.
pub struct BinanceFeed<D> {
    base_url: String,
    symbol: String,
    transport: Transport<D>,
}

impl BinanceFeed<WsDialer> {
    /// Creates a feed for `symbol` on the public endpoint with default
    /// retry settings.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_dialer(
            BINANCE_STREAM_URL,
            symbol,
            WsDialer::new(),
            SocketOptions::default(),
        )
    }

    /// Builds a feed from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Tls`](crate::AgentError::Tls) if a custom CA
    /// certificate is configured but cannot be loaded.
    pub fn from_config(config: &BinanceConfig) -> Result<Self> {
        let mut dialer = WsDialer::new().with_handshake_timeout(config.handshake_timeout);
        if let Some(path) = &config.ca_cert {
            dialer = dialer.with_tls_config(Arc::new(load_tls_config(path)?));
        }

        let options = SocketOptions {
            max_retries: config.max_retries,
            back_off: config.back_off,
        };

        Ok(Self::with_dialer(
            &config.stream_url,
            &config.symbol,
            dialer,
            options,
        ))
    }
}

impl<D: Dialer> BinanceFeed<D> {
    /// Creates a feed with an explicit endpoint, dialer and retry policy.
    ///
    /// `base_url` is the scheme and authority, e.g.
    /// `wss://stream.binance.com:9443`.
    #[must_use]
    pub fn with_dialer(
        base_url: &str,
        symbol: impl Into<String>,
        dialer: D,
        options: SocketOptions,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.into(),
            transport: Transport::new(dialer, options),
        }
    }

    /// URL of the trade stream, `/ws/<symbol>@trade`.
    pub fn trades_url(&self) -> String {
        format!("{}/ws/{}@trade", self.base_url, self.symbol.to_lowercase())
    }

    /// URL of the 100ms diff-depth stream, `/ws/<symbol>@depth@100ms`.
    pub fn depth_url(&self) -> String {
        format!(
            "{}/ws/{}@depth@100ms",
            self.base_url,
            self.symbol.to_lowercase()
        )
    }

    async fn open<T: Send + 'static>(
        &self,
        url: String,
        decode: fn(&[u8]) -> std::result::Result<T, DecodeError>,
        failure: &'static str,
    ) -> Result<Subscription<T>> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        self.transport.connect_and_listen(&url, frame_tx, 0).await?;

        Ok(spawn_decoder(frame_rx, decode, failure))
    }
}

impl<D: Dialer> MarketFeed for BinanceFeed<D> {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn trades(&self) -> Result<Subscription<Trade>> {
        self.open(self.trades_url(), decode_trade, "error unmarshalling trade")
            .await
    }

    async fn depth_updates(&self) -> Result<Subscription<DepthDiff>> {
        self.open(
            self.depth_url(),
            decode_depth,
            "error unmarshalling book update",
        )
        .await
    }
}

/// Decodes frames in wire order until the frame sink closes.
///
/// Returns as soon as the [`Subscription`] is dropped, releasing the frame
/// receiver so the transport closes its connection.
fn spawn_decoder<T: Send + 'static>(
    mut frames: mpsc::Receiver<Vec<u8>>,
    decode: fn(&[u8]) -> std::result::Result<T, DecodeError>,
    failure: &'static str,
) -> Subscription<T> {
    let (tx, rx) = mpsc::channel(RECORD_QUEUE_DEPTH);

    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = frames.recv() => frame,
                () = tx.closed() => {
                    debug!("Record consumer dropped, stopping decoder");
                    return;
                }
            };
            let Some(frame) = frame else {
                return;
            };

            match decode(&frame) {
                Ok(record) => {
                    if tx.send(record).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!(
                        error = %e,
                        detail = %String::from_utf8_lossy(&frame),
                        "{failure}"
                    );
                }
            }
        }
    });

    Subscription::new(rx)
}
