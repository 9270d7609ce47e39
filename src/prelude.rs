//! Prelude module for ttb-broker
//!
//! Re-exports the types a server shell or test harness usually needs.

// Engine and its operation types
pub use crate::engine::{
    BalanceCheck, Balances, CloseTradeReport, OpenTradeReport, OpenTradeRequest, TradingEngine,
    TransferRequest, VenueCloseOutcome,
};

// Configuration
pub use crate::config::{AppConfig, MarginPolicy, Mt5Credentials, VendorCredentials};

// Error type
pub use crate::error::BrokerError;

// Upstream bridge
pub use crate::bridge::{
    CloseRequest, CloseResult, MockVenue, Mt5Bridge, SymbolInfo, TickQuote, TradeRequest,
    TradeResult, Venue, VenuePosition,
};

// Market data
pub use crate::market::{Freshness, MarketDataService, MarketSnapshot};

// Storage
pub use crate::store::MemStore;

// Conversational channel
pub use crate::chat::{Reply, SessionHandler, SessionManager};
pub use crate::webhook::{
    DispatchOutcome, InboundMessage, MessageSender, VendorSender, WebhookDispatcher,
};

// Models
pub use crate::model::*;

pub use crate::logger::setup_logger;
