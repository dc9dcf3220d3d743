//! Wire models for the Binance public market-data streams.
//!
//! Every message is a JSON object keyed by single-letter tags. Keys are
//! case-sensitive (`e`/`E` and `u`/`U` are distinct fields) and unknown
//! keys are ignored. Prices and quantities arrive as quoted strings and are
//! parsed into `f64` at decode time.

pub mod book;
pub mod trade;

use serde::{Deserialize, Deserializer, de};

pub use book::{BookEntry, DepthDiff, decode_depth};
pub use trade::{Trade, decode_trade};

/// Event tag carried by every trade message.
pub const TRADE_EVENT: &str = "trade";

/// Event tag carried by every diff-depth message.
pub const DEPTH_UPDATE_EVENT: &str = "depthUpdate";

/// Reason a single frame was rejected by a decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame was not valid JSON or did not match the record schema.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame parsed but carried a different event tag.
    #[error("unexpected event type {found:?}, expected {expected:?}")]
    UnexpectedEvent {
        expected: &'static str,
        found: String,
    },
}

/// Side of the order book a level update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Returns the lowercase name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

/// Parses a quoted price or quantity.
///
/// Rejects anything that is not a finite, non-negative number.
pub(crate) fn parse_amount(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid numeric value {raw:?}"))?;

    if !value.is_finite() {
        return Err(format!("non-finite numeric value {raw:?}"));
    }
    if value < 0.0 {
        return Err(format!("negative numeric value {raw:?}"));
    }

    Ok(value)
}

/// Serde adapter for `"p": "0.001"` style fields.
pub(crate) fn quoted_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_amount(&raw).map_err(de::Error::custom)
}

/// Checks the `e` tag of a decoded record.
fn expect_event(expected: &'static str, found: &str) -> std::result::Result<(), DecodeError> {
    if found == expected {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedEvent {
            expected,
            found: found.to_string(),
        })
    }
}
