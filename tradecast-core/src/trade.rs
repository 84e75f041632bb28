//! Trade action wire type
//!
//! The same JSON shape is used inbound (client -> hub) and outbound
//! (hub -> subscribers, hub -> topic). Inbound `tradeId` and `timestamp`
//! are accepted but overwritten during enrichment.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::DecodeError;

/// A single trade event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAction {
    /// Server-assigned identifier
    #[serde(rename = "tradeId", default, deserialize_with = "lenient_identity")]
    pub id: String,
    /// Server-assigned RFC 3339 timestamp
    #[serde(default, deserialize_with = "lenient_identity")]
    pub timestamp: String,
    pub price: f64,
    pub volume: i64,
    /// Trader identifier
    pub trader: String,
    /// Action tag, e.g. "buy" or "sell"
    pub action: String,
}

impl TradeAction {
    /// Decode a client payload.
    ///
    /// `price`, `volume`, `trader` and `action` are required; unknown
    /// fields are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Serialize to the outbound JSON representation
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Durable store key for this trade
    pub fn key(&self) -> TradeKey {
        TradeKey {
            trade_id: self.id.clone(),
            timestamp: self.timestamp.clone(),
        }
    }

    /// Returns a copy carrying the given server identity
    pub fn with_identity(&self, id: String, timestamp: String) -> Self {
        Self {
            id,
            timestamp,
            ..self.clone()
        }
    }
}

/// Identity fields are overwritten on enrichment, so any JSON value is
/// accepted inbound. Strings are kept; null becomes empty.
fn lenient_identity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Durable store key: `(trade_id, timestamp)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeKey {
    pub trade_id: String,
    pub timestamp: String,
}

impl fmt::Display for TradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.trade_id, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_missing_identity() {
        let trade =
            TradeAction::decode(br#"{"price":1.5,"volume":10,"trader":"x","action":"buy"}"#)
                .unwrap();

        assert_eq!(trade.id, "");
        assert_eq!(trade.timestamp, "");
        assert_eq!(trade.price, 1.5);
        assert_eq!(trade.volume, 10);
        assert_eq!(trade.trader, "x");
        assert_eq!(trade.action, "buy");
    }

    #[test]
    fn test_decode_accepts_client_identity_and_unknown_fields() {
        let trade = TradeAction::decode(
            br#"{"tradeId":"client","timestamp":"yesterday","price":2,"volume":1,"trader":"t","action":"sell","venue":"x"}"#,
        )
        .unwrap();

        assert_eq!(trade.id, "client");
        assert_eq!(trade.price, 2.0);
    }

    #[test]
    fn test_decode_accepts_null_and_numeric_identity() {
        let trade = TradeAction::decode(
            br#"{"tradeId":null,"timestamp":null,"price":1.5,"volume":10,"trader":"x","action":"buy"}"#,
        )
        .unwrap();
        assert_eq!(trade.id, "");
        assert_eq!(trade.timestamp, "");

        let trade = TradeAction::decode(
            br#"{"tradeId":12345,"timestamp":1700000000,"price":1.5,"volume":10,"trader":"x","action":"buy"}"#,
        )
        .unwrap();
        assert_eq!(trade.id, "12345");
        assert_eq!(trade.price, 1.5);
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        assert!(TradeAction::decode(b"{").is_err());
        assert!(TradeAction::decode(br#"{"trader":"x","action":"buy"}"#).is_err());
        assert!(
            TradeAction::decode(br#"{"price":"1.5","volume":10,"trader":"x","action":"buy"}"#)
                .is_err()
        );
        assert!(
            TradeAction::decode(br#"{"price":1.5,"volume":10.5,"trader":"x","action":"buy"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_outbound_field_names() {
        let trade = TradeAction {
            id: "42".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            price: 1.5,
            volume: 10,
            trader: "x".to_string(),
            action: "buy".to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(&trade.to_json().unwrap()).unwrap();
        assert_eq!(value["tradeId"], "42");
        assert_eq!(value["timestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(value["volume"], 10);
        assert_eq!(trade.key().to_string(), "42@2024-01-01T00:00:00Z");
    }
}
