//! Application configuration loaded from environment variables.
//!
//! All variables are optional:
//! - `BINANCE_SYMBOL`: trading pair to follow (default `btcusdt`)
//! - `BINANCE_STREAM_URL`: stream endpoint (default `wss://stream.binance.com:9443`)
//! - `BINANCE_MAX_RETRIES`: retries after the first failed attempt (default 5)
//! - `BINANCE_BACKOFF_MS`: pause between attempts (default 5000)
//! - `BINANCE_HANDSHAKE_TIMEOUT_MS`: WebSocket handshake limit (default 10000)
//! - `BINANCE_CA_CERT`: PEM file of trusted roots replacing the bundled ones

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::feed::BINANCE_STREAM_URL;
use crate::websocket::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::websocket::connection::{DEFAULT_BACK_OFF, DEFAULT_MAX_RETRIES};

/// Default trading pair.
const DEFAULT_SYMBOL: &str = "btcusdt";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub binance: BinanceConfig,
}

/// Binance stream configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceConfig {
    pub symbol: String,
    pub stream_url: String,
    pub max_retries: u32,
    pub back_off: Duration,
    pub handshake_timeout: Duration,
    pub ca_cert: Option<PathBuf>,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            stream_url: BINANCE_STREAM_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            back_off: DEFAULT_BACK_OFF,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ca_cert: None,
        }
    }
}

/// Loads the application configuration from environment variables.
///
/// Unset or empty variables fall back to their defaults. The symbol is
/// lowercased since stream names are case-sensitive.
///
/// # Errors
///
/// Returns [`AgentError::Config`](crate::AgentError::Config) if a numeric
/// variable cannot be parsed.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let defaults = BinanceConfig::default();

    let symbol = non_empty_var("BINANCE_SYMBOL")
        .map(|s| s.to_lowercase())
        .unwrap_or(defaults.symbol);
    let stream_url = non_empty_var("BINANCE_STREAM_URL").unwrap_or(defaults.stream_url);
    let max_retries = parsed_var("BINANCE_MAX_RETRIES")?.unwrap_or(defaults.max_retries);
    let back_off = parsed_var("BINANCE_BACKOFF_MS")?
        .map(Duration::from_millis)
        .unwrap_or(defaults.back_off);
    let handshake_timeout = parsed_var("BINANCE_HANDSHAKE_TIMEOUT_MS")?
        .map(Duration::from_millis)
        .unwrap_or(defaults.handshake_timeout);
    let ca_cert = non_empty_var("BINANCE_CA_CERT").map(PathBuf::from);

    Ok(AppConfig {
        binance: BinanceConfig {
            symbol,
            stream_url,
            max_retries,
            back_off,
            handshake_timeout,
            ca_cert,
        },
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parses a non-empty environment variable.
fn parsed_var<T: FromStr>(name: &str) -> crate::Result<Option<T>> {
    non_empty_var(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                crate::AgentError::Config(format!("{name} must be a non-negative integer, got {raw:?}"))
            })
        })
        .transpose()
}
