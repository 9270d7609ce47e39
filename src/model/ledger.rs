//! Append-only journal entries

use crate::model::order::OrderSide;
use chrono::{DateTime, Utc};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// What kind of event a journal line records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Order,
    LpPosition,
    Transaction,
}

/// Double-entry nature of a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryNature {
    Debit,
    Credit,
}

/// Asset a TRANSACTION line mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    /// AED cash balance
    Cash,
    /// Gram metal balance
    Gold,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "CASH"),
            Self::Gold => write!(f, "GOLD"),
        }
    }
}

/// Detail subrecord of an ORDER line
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub side: OrderSide,
    pub volume: Decimal,
    pub opening_price: Option<Decimal>,
    pub closing_price: Option<Decimal>,
}

/// Detail subrecord of an LP_POSITION line
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct LpDetails {
    pub entry_price: Option<Decimal>,
    pub closing_price: Option<Decimal>,
    pub profit: Option<Decimal>,
}

/// Detail subrecord of a TRANSACTION line
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub asset: AssetKind,
    /// Balance of the asset before the mutation this line records
    pub previous_balance: Decimal,
}

/// Typed detail attached to a journal line
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryDetails {
    Order(OrderDetails),
    LpPosition(LpDetails),
    Transaction(TransactionDetails),
}

/// One immutable journal line.
///
/// Four lines are written per open and per close, in the order
/// ORDER, LP_POSITION, TRX-CASH, TRX-GOLD.
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// `ORD-`, `LP-` or `TRX-` prefixed identifier
    pub entry_id: String,
    pub entry_type: EntryType,
    pub entry_nature: EntryNature,
    /// The related order's `order_no`, or the transaction id for transfers
    pub reference_number: String,
    pub amount: Decimal,
    /// Account balance of the affected asset after the mutation
    pub running_balance: Decimal,
    pub date: DateTime<Utc>,
    /// Owning account id
    pub user: String,
    pub admin_id: String,
    pub details: EntryDetails,
    pub description: String,
    pub notes: Option<String>,
}

impl LedgerEntry {
    /// Signed amount: credits are positive, debits negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_nature {
            EntryNature::Credit => self.amount,
            EntryNature::Debit => -self.amount,
        }
    }

    /// Asset this line mutates; only TRANSACTION lines touch a balance.
    pub fn asset(&self) -> Option<AssetKind> {
        match &self.details {
            EntryDetails::Transaction(details) => Some(details.asset),
            _ => None,
        }
    }
}
