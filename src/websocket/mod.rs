//! Streaming transport for the Binance WebSocket endpoints.
//!
//! - [`Dialer`] / [`Connection`] - the seam between the retry logic and the
//!   network, implemented for real sockets by [`WsDialer`]
//! - [`connection`] - the reconnecting [`Transport`] read loop

pub mod connection;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::debug;
use tungstenite::Message;

use crate::Result;
use crate::error::AgentError;

pub use connection::{SocketOptions, Transport};

/// Default upper bound on the WebSocket opening handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens streaming connections.
///
/// Implementations must be shareable across the transport tasks that
/// redial after a read failure.
pub trait Dialer: Send + Sync + 'static {
    type Connection: Connection;

    /// Establishes a new connection to `url`.
    fn dial(&self, url: &str) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An established connection producing opaque data frames.
pub trait Connection: Send + 'static {
    /// Waits for the next data frame.
    ///
    /// Any error, including an orderly close by the peer, ends the
    /// connection.
    fn read_frame(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Closes the connection, ignoring failures.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Dialer backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsDialer {
    tls_config: Option<Arc<rustls::ClientConfig>>,
    handshake_timeout: Duration,
}

impl WsDialer {
    /// Creates a dialer trusting the bundled webpki roots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tls_config: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Uses `config` for `wss` connections instead of the bundled roots.
    #[must_use]
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl Default for WsDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer for WsDialer {
    type Connection = WsConnection;

    async fn dial(&self, url: &str) -> Result<WsConnection> {
        let connector = self.tls_config.clone().map(Connector::Rustls);
        let handshake = connect_async_tls_with_config(url, None, false, connector);

        let (stream, _) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| AgentError::HandshakeTimeout(self.handshake_timeout))??;
        debug!(url, "WebSocket handshake completed");

        Ok(WsConnection { stream })
    }
}

/// A live WebSocket connection.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WsConnection {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Received close frame");
                    return Err(AgentError::ConnectionClosed);
                }
                Some(Ok(_)) => {} // Ping/Pong/raw frames
                Some(Err(e)) => return Err(e.into()),
                None => return Err(AgentError::ConnectionClosed),
            }
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {e}");
        }
    }
}
