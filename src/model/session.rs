//! Per-phone conversational session state

use crate::model::order::OrderSide;
use chrono::{DateTime, Utc};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Conversational state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatState {
    #[default]
    Start,
    MainMenu,
    /// A side was chosen; the next number is the volume
    AwaitingVolume,
    /// A quote was shown; awaiting Y/N
    ConfirmOrder,
    Statement,
}

/// Order being assembled during the conversation
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub side: OrderSide,
    /// Volume in grams
    pub volume: Decimal,
    /// Client unit quote at the time the confirmation was shown
    pub price: Decimal,
    /// TTB AED value of the pending order
    pub total_cost: Decimal,
}

/// Cached view of an open order, used to resolve `CLOSE <index>`
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct OpenOrderRef {
    pub order_id: String,
    pub order_no: String,
    pub side: OrderSide,
    pub volume: Decimal,
    pub opening_price: Decimal,
}

/// Cached view of a live venue position, refreshed by the ORDERS command
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct VenuePositionRef {
    pub ticket: u64,
    pub side: OrderSide,
    pub volume: Decimal,
    pub price_open: Decimal,
    pub profit: Decimal,
}

/// One phone number's conversation
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub phone: String,
    /// Account this phone is authorized for
    pub account_id: String,
    pub state: ChatState,
    pub pending_order: Option<PendingOrder>,
    /// 1-based targets for `CLOSE <index>`
    pub open_orders: Vec<OpenOrderRef>,
    /// Venue positions as of the last ORDERS command
    pub open_positions: Vec<VenuePositionRef>,
    pub last_activity: DateTime<Utc>,
    pub user_name: Option<String>,
}

impl ChatSession {
    /// Fresh session for an authorized phone.
    pub fn new(phone: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            account_id: account_id.into(),
            state: ChatState::Start,
            pending_order: None,
            open_orders: Vec::new(),
            open_positions: Vec::new(),
            last_activity: Utc::now(),
            user_name: None,
        }
    }

    /// Drop any half-built order and return to the menu.
    pub fn reset(&mut self) {
        self.state = ChatState::MainMenu;
        self.pending_order = None;
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
