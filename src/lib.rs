//! Binance market-data SDK for trading agents.
//!
//! Opens the public trade and diff-depth streams for a symbol, decodes
//! every frame into typed records, and dispatches them to a user-supplied
//! [`Strategy`](agent::Strategy). Connections are retried with a fixed
//! backoff and a bounded attempt budget; once the budget is spent the
//! affected sequence simply ends.

pub mod agent;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod tls;
pub mod websocket;

pub use agent::{Agent, Strategy};
pub use error::{AgentError, Result};
pub use feed::{BinanceFeed, MarketFeed, Subscription};
