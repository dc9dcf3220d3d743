//! Shared test utilities: log capture, scripted transports, a local stream
//! server, and recording strategies.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing_subscriber::fmt::MakeWriter;
use tungstenite::Message;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;

use binance_agent::agent::Extras;
use binance_agent::models::{BookEntry, DepthDiff, Trade};
use binance_agent::websocket::{Connection, Dialer};
use binance_agent::{AgentError, MarketFeed, Result, Strategy, Subscription};

pub const TEST_SYMBOL: &str = "test";
pub const TRADES_PATH: &str = "/ws/test@trade";
pub const DEPTH_PATH: &str = "/ws/test@depth@100ms";

pub const RAW_TRADE: &str = r#"{"e":"trade","E":123456789,"s":"BNBBTC","t":12345,"p":"0.001","q":"100","b":88,"a":50,"T":123456785,"m":true,"M":true}"#;

pub const BAD_TRADE: &str = r#"{"e":"trade","E":123456789,"s":"BNBBTC","t":12345,"p":"0.001","q":"100","b":88,"a":50,"T":"TIMESTAMP","m":true,"M":true}"#;

pub const RAW_DEPTH: &str = r#"{"e":"depthUpdate","E":123456789,"U":157,"u":160,"b":[["0.0024","10"]],"a":[["0.0026","100"]]}"#;

pub const BAD_DEPTH: &str = r#"{"e":"depthUpdate","E":"TIMESTAMP","s":"BNBBTC","U":157,"u":160,"b":[["0.0024","10"]],"a":[["0.0026","100"]]}"#;

/// Trade decoded from [`RAW_TRADE`].
pub fn expected_trade() -> Trade {
    Trade {
        event_type: "trade".to_string(),
        event_time: 123456789,
        symbol: Some("BNBBTC".to_string()),
        id: 12345,
        price: 0.001,
        quantity: 100.0,
        buyer_order_id: 88,
        seller_order_id: 50,
        trade_time: 123456785,
        is_buyer_maker: true,
    }
}

pub fn trade(id: u64, price: f64, quantity: f64, buyer: u64, seller: u64) -> Trade {
    Trade {
        event_type: "trade".to_string(),
        event_time: 123456789,
        symbol: None,
        id,
        price,
        quantity,
        buyer_order_id: buyer,
        seller_order_id: seller,
        trade_time: 123456785,
        is_buyer_maker: false,
    }
}

pub fn diff(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> DepthDiff {
    let levels = |entries: &[(f64, f64)]| {
        entries
            .iter()
            .map(|&(price, quantity)| BookEntry { price, quantity })
            .collect()
    };

    DepthDiff {
        event_type: "depthUpdate".to_string(),
        event_time: 123456789,
        symbol: None,
        first_update_id: Some(157),
        last_update_id: 160,
        bids: levels(bids),
        asks: levels(asks),
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// In-memory sink for formatted `tracing` output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Returns `true` if an ERROR line contains `msg`.
    pub fn contains_error(&self, msg: &str) -> bool {
        self.contents()
            .lines()
            .any(|line| line.contains("ERROR") && line.contains(msg))
    }

    pub fn count_errors(&self, msg: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains("ERROR") && line.contains(msg))
            .count()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes `tracing` output on the current thread into a buffer.
///
/// `#[tokio::test]` runs every spawned task on the test thread, so events
/// from transport and decode tasks are captured too.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);

    (buffer, guard)
}

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// One read result produced by a [`ScriptedConnection`].
#[derive(Debug, Clone)]
pub enum Step {
    Frame(&'static str),
    Fail,
}

/// Outcome of one dial attempt.
#[derive(Debug, Clone)]
pub enum Dial {
    Refuse,
    Accept(Vec<Step>),
}

/// Dialer that replays a fixed script and refuses once it runs out.
pub struct ScriptedDialer {
    script: Mutex<VecDeque<Dial>>,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedDialer {
    pub fn new(script: Vec<Dial>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always_refusing() -> Self {
        Self::new(Vec::new())
    }

    /// Counter of dial attempts, shared with the dialer.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }

    /// Counter of closed connections, shared with the dialer.
    pub fn closed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }
}

impl Dialer for ScriptedDialer {
    type Connection = ScriptedConnection;

    async fn dial(&self, _url: &str) -> Result<ScriptedConnection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(Dial::Accept(steps)) => Ok(ScriptedConnection {
                steps: steps.into(),
                closed: Arc::clone(&self.closed),
            }),
            _ => Err(AgentError::WebSocket(tungstenite::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))),
        }
    }
}

/// Connection that yields scripted steps, then idles forever.
pub struct ScriptedConnection {
    steps: VecDeque<Step>,
    closed: Arc<AtomicUsize>,
}

impl Connection for ScriptedConnection {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(frame.as_bytes().to_vec()),
            Some(Step::Fail) => Err(AgentError::ConnectionClosed),
            None => std::future::pending().await,
        }
    }

    async fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Local stream server
// ---------------------------------------------------------------------------

/// Plain `ws://` server that sends fixed frames per path, then closes.
pub struct StreamServer {
    pub base_url: String,
    requested: Arc<Mutex<Vec<String>>>,
}

impl StreamServer {
    /// Paths of every accepted connection, in order.
    pub fn requested_paths(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

/// Starts a server on an ephemeral port. Unknown paths fail the handshake
/// with 404.
pub async fn spawn_stream_server(routes: Vec<(&'static str, Vec<&'static str>)>) -> StreamServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<&'static str, Vec<&'static str>>> =
        Arc::new(routes.into_iter().collect());
    let requested = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requested);

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            let seen = Arc::clone(&seen);

            tokio::spawn(async move {
                let path = Arc::new(Mutex::new(String::new()));
                let captured = Arc::clone(&path);
                let known = Arc::clone(&routes);

                let callback = move |req: &Request, resp: Response| {
                    let requested = req.uri().path().to_string();
                    let found = known.contains_key(requested.as_str());
                    *captured.lock().unwrap() = requested;
                    if found {
                        Ok(resp)
                    } else {
                        let mut rejection = ErrorResponse::new(Some("unknown stream".to_string()));
                        *rejection.status_mut() = StatusCode::NOT_FOUND;
                        Err(rejection)
                    }
                };

                let Ok(mut ws) = accept_hdr_async(tcp, callback).await else {
                    return;
                };

                let path = path.lock().unwrap().clone();
                seen.lock().unwrap().push(path.clone());

                let frames = routes.get(path.as_str()).cloned().unwrap_or_default();
                for frame in frames {
                    if ws.send(Message::Text(frame.to_string().into())).await.is_err() {
                        return;
                    }
                }

                // Close, then wait for the client's reply so the socket shuts down cleanly.
                let _ = ws.close(None).await;
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    StreamServer {
        base_url: format!("ws://{addr}"),
        requested,
    }
}

// ---------------------------------------------------------------------------
// Strategies and feeds
// ---------------------------------------------------------------------------

/// A strategy callback as observed by [`RecordingStrategy`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Trade {
        price: f64,
        quantity: f64,
        trade_id: String,
        buyer_order_id: String,
        seller_order_id: String,
    },
    Bid(f64, f64),
    Ask(f64, f64),
}

/// Records every callback in arrival order.
#[derive(Default)]
pub struct RecordingStrategy {
    calls: Mutex<Vec<Call>>,
}

impl RecordingStrategy {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bids(&self) -> Vec<(f64, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Bid(price, quantity) => Some((price, quantity)),
                _ => None,
            })
            .collect()
    }

    pub fn asks(&self) -> Vec<(f64, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Ask(price, quantity) => Some((price, quantity)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Strategy for RecordingStrategy {
    async fn new_order(
        &self,
        _order_id: &str,
        _price: f64,
        _quantity: f64,
        _extras: &Extras,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_trade(
        &self,
        price: f64,
        quantity: f64,
        trade_id: &str,
        buyer_order_id: &str,
        seller_order_id: &str,
        _extras: &Extras,
    ) {
        self.record(Call::Trade {
            price,
            quantity,
            trade_id: trade_id.to_string(),
            buyer_order_id: buyer_order_id.to_string(),
            seller_order_id: seller_order_id.to_string(),
        });
    }

    async fn on_book_update_bid(&self, price: f64, quantity: f64, _extras: &Extras) {
        self.record(Call::Bid(price, quantity));
    }

    async fn on_book_update_ask(&self, price: f64, quantity: f64, _extras: &Extras) {
        self.record(Call::Ask(price, quantity));
    }
}

/// Feed whose sequences are fed by the test through channels.
///
/// A stream configured as `None` fails to open.
pub struct ScriptedFeed {
    trades: Mutex<Option<mpsc::Receiver<Trade>>>,
    depth: Mutex<Option<mpsc::Receiver<DepthDiff>>>,
    depth_opened: Arc<AtomicBool>,
}

impl ScriptedFeed {
    pub fn new(
        trades: Option<mpsc::Receiver<Trade>>,
        depth: Option<mpsc::Receiver<DepthDiff>>,
    ) -> Self {
        Self {
            trades: Mutex::new(trades),
            depth: Mutex::new(depth),
            depth_opened: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Feed with both streams open, plus the senders driving them.
    pub fn open() -> (Self, mpsc::Sender<Trade>, mpsc::Sender<DepthDiff>) {
        let (trade_tx, trade_rx) = mpsc::channel(16);
        let (depth_tx, depth_rx) = mpsc::channel(16);
        (
            Self::new(Some(trade_rx), Some(depth_rx)),
            trade_tx,
            depth_tx,
        )
    }

    pub fn depth_opened(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.depth_opened)
    }
}

impl MarketFeed for ScriptedFeed {
    fn symbol(&self) -> &str {
        TEST_SYMBOL
    }

    async fn trades(&self) -> Result<Subscription<Trade>> {
        let rx = self.trades.lock().unwrap().take();
        rx.map(Subscription::new)
            .ok_or_else(|| AgentError::ConnectionFailed {
                url: format!("scripted://{TEST_SYMBOL}@trade"),
            })
    }

    async fn depth_updates(&self) -> Result<Subscription<DepthDiff>> {
        self.depth_opened.store(true, Ordering::SeqCst);
        let rx = self.depth.lock().unwrap().take();
        rx.map(Subscription::new)
            .ok_or_else(|| AgentError::ConnectionFailed {
                url: format!("scripted://{TEST_SYMBOL}@depth@100ms"),
            })
    }
}
