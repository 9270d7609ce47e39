//! Client-facing trade records

use chrono::{DateTime, Utc};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Direction of a client order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side used to flatten this order on the venue.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Open on the client book, margin held
    #[default]
    Processing,
    /// Acknowledged by the venue but not yet booked
    Executed,
    /// Reversed before settlement
    Cancelled,
    /// Settled; closing price, date and profit are recorded
    Closed,
    /// Accepted but awaiting venue confirmation
    Pending,
    /// Venue placement failed after the order was written
    Failed,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled | Self::Failed)
    }
}

/// The client-facing trade
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Storage identifier
    pub id: String,
    /// Unique order number, `ORD-` prefixed
    pub order_no: String,
    pub side: OrderSide,
    /// Volume in grams
    pub volume: Decimal,
    /// Logical symbol, e.g. "GOLD"
    pub symbol: String,
    /// Latest reference price; mirrors `closing_price` once closed
    pub price: Decimal,
    /// Quoted spot adjusted by the account spread at open
    pub opening_price: Decimal,
    /// Client closing quote, set when the order closes
    pub closing_price: Option<Decimal>,
    /// Cash reserved for this position
    pub required_margin: Decimal,
    pub opening_date: DateTime<Utc>,
    pub closing_date: Option<DateTime<Utc>>,
    pub order_status: OrderStatus,
    /// Client profit, two-decimal precision, non-zero only once closed
    pub profit: Decimal,
    /// Owning account id
    pub user: String,
    pub admin_id: String,
    /// Companion LP position id, set iff the mirror was written
    pub lp_position_id: Option<String>,
    /// Venue ticket, set iff the venue returned one
    pub ticket: Option<u64>,
    pub comment: Option<String>,
    /// Recorded when the post-commit client notification failed
    pub notification_error: Option<String>,
}

/// Whitelisted fields accepted by the close/update operation.
///
/// Anything else sent by the admin surface is dropped at deserialization.
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_status: Option<OrderStatus>,
    pub closing_price: Option<Decimal>,
    pub closing_date: Option<DateTime<Utc>>,
    pub profit: Option<Decimal>,
    pub comment: Option<String>,
    pub price: Option<Decimal>,
}

impl OrderUpdate {
    /// Update that closes an order at the given spot price.
    pub fn close_at(spot: Decimal) -> Self {
        Self {
            order_status: Some(OrderStatus::Closed),
            closing_price: Some(spot),
            ..Self::default()
        }
    }
}
