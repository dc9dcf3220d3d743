//! Diff-depth stream models.

use serde::{Deserialize, Deserializer, de};

use super::{DEPTH_UPDATE_EVENT, DecodeError, expect_event, parse_amount};

/// A batch of order book level changes from the `<symbol>@depth@100ms` stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DepthDiff {
    /// Always `"depthUpdate"`.
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    /// First update ID in the event.
    #[serde(rename = "U", default)]
    pub first_update_id: Option<u64>,
    /// Final update ID in the event.
    #[serde(rename = "u")]
    pub last_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<BookEntry>,
    #[serde(rename = "a")]
    pub asks: Vec<BookEntry>,
}

/// A single price level, transmitted as `["price", "quantity"]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookEntry {
    pub price: f64,
    pub quantity: f64,
}

impl BookEntry {
    /// A zero quantity means the price level no longer has any liquidity.
    pub fn is_removal(&self) -> bool {
        self.quantity == 0.0
    }
}

impl<'de> Deserialize<'de> for BookEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Vec::<String>::deserialize(deserializer)?;
        if fields.len() != 2 {
            return Err(de::Error::custom(format!(
                "wrong number of fields in book entry: {} != 2",
                fields.len()
            )));
        }

        Ok(BookEntry {
            price: parse_amount(&fields[0]).map_err(de::Error::custom)?,
            quantity: parse_amount(&fields[1]).map_err(de::Error::custom)?,
        })
    }
}

/// Decodes one raw frame from the diff-depth stream.
///
/// A single malformed level rejects the whole message.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] if the frame does not match the
/// depth schema and [`DecodeError::UnexpectedEvent`] if its tag is not
/// `depthUpdate`.
pub fn decode_depth(frame: &[u8]) -> Result<DepthDiff, DecodeError> {
    let diff: DepthDiff = serde_json::from_slice(frame)?;
    expect_event(DEPTH_UPDATE_EVENT, &diff.event_type)?;
    Ok(diff)
}
