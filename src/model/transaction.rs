//! Deposit and withdrawal records

use crate::model::ledger::AssetKind;
use chrono::{DateTime, Utc};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a cash or metal transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

/// Transfer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Failed,
    Cancelled,
}

/// A completed or pending transfer against one asset balance
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// `TXN-` prefixed identifier
    pub transaction_id: String,
    pub txn_type: TransactionType,
    pub asset: AssetKind,
    pub amount: Decimal,
    /// Asset balance before the transfer
    pub previous_balance: Decimal,
    /// Asset balance after the transfer
    pub new_balance: Decimal,
    pub status: TransactionStatus,
    /// Owning account id
    pub user: String,
    pub admin_id: String,
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Signed delta this transfer applied to the asset balance.
    pub fn delta(&self) -> Decimal {
        match self.txn_type {
            TransactionType::Deposit => self.amount,
            TransactionType::Withdrawal => -self.amount,
        }
    }
}
