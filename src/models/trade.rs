//! Trade stream models.

use serde::Deserialize;

use super::{DecodeError, TRADE_EVENT, expect_event, quoted_amount};

/// A single completed trade from the `<symbol>@trade` stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trade {
    /// Always `"trade"`.
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    #[serde(rename = "t")]
    pub id: u64,
    #[serde(rename = "p", deserialize_with = "quoted_amount")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "quoted_amount")]
    pub quantity: f64,
    /// Absent from newer payloads, in which case it is 0.
    #[serde(rename = "b", default)]
    pub buyer_order_id: u64,
    #[serde(rename = "a", default)]
    pub seller_order_id: u64,
    #[serde(rename = "T")]
    pub trade_time: u64,
    /// Whether the buyer was the resting (maker) side.
    #[serde(rename = "m", default)]
    pub is_buyer_maker: bool,
}

/// Decodes one raw frame from the trade stream.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] if the frame does not match the trade
/// schema and [`DecodeError::UnexpectedEvent`] if its tag is not `trade`.
pub fn decode_trade(frame: &[u8]) -> Result<Trade, DecodeError> {
    let trade: Trade = serde_json::from_slice(frame)?;
    expect_event(TRADE_EVENT, &trade.event_type)?;
    Ok(trade)
}
