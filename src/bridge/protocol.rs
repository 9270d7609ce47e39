//! Wire types for the line-delimited JSON protocol spoken by the MT5 subprocess

use crate::constants::retcode;
use crate::model::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

/// One request line sent to the subprocess
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRequest {
    pub action: String,
    pub request_id: u64,
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

/// One response line received from the subprocess.
///
/// Lines without a `request_id` are async events, routed separately.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeResponse {
    pub request_id: Option<u64>,
    #[serde(default)]
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Payload of an async `price_update` event
#[derive(Debug, Clone, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub spread: Decimal,
}

/// A bid/ask tick for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickQuote {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread: Decimal,
    /// Server time of the tick
    pub time: DateTime<Utc>,
}

/// Venue-side symbol metadata used to validate trade requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    /// 0 means trading disabled
    pub trade_mode: i64,
    pub volume_min: Decimal,
    pub volume_max: Decimal,
    pub volume_step: Decimal,
    /// Minimum stop distance in points
    pub stops_level: u32,
    /// Price value of one point
    pub point: Decimal,
    #[serde(default)]
    pub digits: u32,
}

/// Trade placement request
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub volume: Decimal,
    #[serde(rename = "type")]
    pub side: OrderSide,
    pub sl_distance: Option<Decimal>,
    pub tp_distance: Option<Decimal>,
    pub comment: Option<String>,
    pub magic: Option<u64>,
}

/// Venue acknowledgement of a placed trade
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub ticket: u64,
    pub deal: Option<u64>,
    pub price: Decimal,
    pub volume: Decimal,
    pub sl: Option<Decimal>,
    pub tp: Option<Decimal>,
    pub retcode: u32,
}

/// A live position on the venue
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuePosition {
    pub ticket: u64,
    #[serde(rename = "type")]
    pub side: OrderSide,
    pub volume: Decimal,
    pub price_open: Decimal,
    pub price_current: Decimal,
    pub profit: Decimal,
    pub symbol: String,
    pub comment: Option<String>,
}

/// Close request; the bridge fills volume and symbol from the live position
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequest {
    pub ticket: u64,
    pub symbol: Option<String>,
    pub volume: Option<Decimal>,
    #[serde(rename = "type")]
    pub side: Option<OrderSide>,
}

/// Outcome of a close attempt
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResult {
    pub success: bool,
    pub close_price: Option<Decimal>,
    pub profit: Option<Decimal>,
    /// The venue no longer knows the ticket; treat as already closed
    #[serde(default)]
    pub likely_closed: bool,
    pub data: Option<Value>,
}

impl CloseResult {
    /// Result for a ticket the venue no longer tracks.
    pub fn already_closed() -> Self {
        Self {
            success: false,
            close_price: None,
            profit: None,
            likely_closed: true,
            data: None,
        }
    }
}

/// Human-readable message for a venue retcode.
pub fn retcode_message(code: u32) -> &'static str {
    match code {
        retcode::DONE => "Request completed",
        retcode::REQUOTE => "Requote: price is no longer valid",
        retcode::INVALID_PARAMS => "Invalid request parameters",
        retcode::MARKET_CLOSED => "Market is closed",
        retcode::NO_MONEY => "Insufficient funds on the venue account",
        retcode::PRICE_CHANGED => "Prices changed while processing the request",
        retcode::INVALID_REQUEST => "Invalid request",
        retcode::INVALID_STOPS => "Invalid stop-loss or take-profit",
        retcode::AUTOTRADING_DISABLED => "Autotrading is disabled on the terminal",
        _ => "Venue request failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_serializes_flat() {
        let mut params = serde_json::Map::new();
        params.insert("symbol".into(), Value::String("XAUUSD".into()));
        let req = BridgeRequest {
            action: "get_price".into(),
            request_id: 7,
            params,
        };
        let line = serde_json::to_string(&req).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["action"], "get_price");
        assert_eq!(value["request_id"], 7);
        assert_eq!(value["symbol"], "XAUUSD");
    }

    #[test]
    fn test_trade_request_uses_wire_side_names() {
        let req = TradeRequest {
            symbol: "XAUUSD".into(),
            volume: dec!(0.01),
            side: OrderSide::Sell,
            sl_distance: None,
            tp_distance: None,
            comment: None,
            magic: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "SELL");
    }

    #[test]
    fn test_retcode_messages_cover_known_codes() {
        assert_eq!(retcode_message(10009), "Request completed");
        assert!(retcode_message(10018).contains("closed"));
        assert!(retcode_message(10020).contains("Prices changed"));
        assert_eq!(retcode_message(99999), "Venue request failed");
    }
}
