//! Mirrored liquidity-provider positions

use crate::model::order::OrderSide;
use chrono::{DateTime, Utc};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// LP position lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    #[default]
    Open,
    Closed,
}

/// The upstream mirror of a client order.
///
/// Exactly one exists per client order; `entry_price` is the spread-free
/// spot at open, and `profit` at close is the spread captured on both legs.
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct LpPosition {
    /// Equals the client order's `order_no`
    pub position_id: String,
    pub side: OrderSide,
    /// Volume in grams, equal to the client order's volume
    pub volume: Decimal,
    pub symbol: String,
    /// Raw spot at open, no spread applied
    pub entry_price: Decimal,
    /// Latest spot seen for this position
    pub current_price: Decimal,
    /// Raw spot at close
    pub closing_price: Option<Decimal>,
    pub open_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
    pub status: PositionStatus,
    /// Broker profit in AED, set at close
    pub profit: Decimal,
    /// Storage id of the client order
    pub client_order: String,
    pub admin_id: String,
}
