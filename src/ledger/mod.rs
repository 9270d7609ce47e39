//! Append-only journal writing and queries
//!
//! The engine emits four lines per trade leg (ORDER, LP_POSITION, TRX-CASH,
//! TRX-GOLD) and one per transfer. Running balances are captured after the
//! balance mutation, previous balances before it, so the journal replays to
//! the current book.

use crate::model::{
    AssetKind, EntryDetails, EntryNature, EntryType, LedgerEntry, LpDetails, OrderDetails,
    TransactionDetails,
};
use crate::store::BookState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Builds the journal lines of one engine operation.
///
/// All lines share the user, admin, reference number and date; the writer
/// keeps those in one place so the four legs cannot drift apart.
#[derive(Debug, Clone)]
pub struct JournalWriter {
    user: String,
    admin_id: String,
    reference: String,
    date: DateTime<Utc>,
}

impl JournalWriter {
    pub fn new(
        user: impl Into<String>,
        admin_id: impl Into<String>,
        reference: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            user: user.into(),
            admin_id: admin_id.into(),
            reference: reference.into(),
            date,
        }
    }

    fn entry(
        &self,
        entry_id: String,
        entry_type: EntryType,
        entry_nature: EntryNature,
        amount: Decimal,
        running_balance: Decimal,
        details: EntryDetails,
        description: String,
    ) -> LedgerEntry {
        LedgerEntry {
            entry_id,
            entry_type,
            entry_nature,
            reference_number: self.reference.clone(),
            amount,
            running_balance,
            date: self.date,
            user: self.user.clone(),
            admin_id: self.admin_id.clone(),
            details,
            description,
            notes: None,
        }
    }

    /// ORDER line.
    pub fn order(
        &self,
        entry_id: String,
        nature: EntryNature,
        amount: Decimal,
        running_balance: Decimal,
        details: OrderDetails,
        description: impl Into<String>,
    ) -> LedgerEntry {
        self.entry(
            entry_id,
            EntryType::Order,
            nature,
            amount,
            running_balance,
            EntryDetails::Order(details),
            description.into(),
        )
    }

    /// LP_POSITION line.
    pub fn lp_position(
        &self,
        entry_id: String,
        nature: EntryNature,
        amount: Decimal,
        running_balance: Decimal,
        details: LpDetails,
        description: impl Into<String>,
    ) -> LedgerEntry {
        self.entry(
            entry_id,
            EntryType::LpPosition,
            nature,
            amount,
            running_balance,
            EntryDetails::LpPosition(details),
            description.into(),
        )
    }

    /// TRANSACTION line against one asset balance.
    pub fn transaction(
        &self,
        entry_id: String,
        nature: EntryNature,
        asset: AssetKind,
        amount: Decimal,
        running_balance: Decimal,
        previous_balance: Decimal,
        description: impl Into<String>,
    ) -> LedgerEntry {
        self.entry(
            entry_id,
            EntryType::Transaction,
            nature,
            amount,
            running_balance,
            EntryDetails::Transaction(TransactionDetails {
                asset,
                previous_balance,
            }),
            description.into(),
        )
    }
}

/// Journal lines for one user, newest first, paginated.
pub fn entries_for_user(
    state: &BookState,
    user: &str,
    offset: usize,
    limit: usize,
) -> Vec<LedgerEntry> {
    let mut entries: Vec<LedgerEntry> = state
        .ledger
        .iter()
        .filter(|entry| entry.user == user)
        .cloned()
        .collect();
    entries.sort_by(|a, b| b.date.cmp(&a.date).then(b.entry_id.cmp(&a.entry_id)));
    entries.into_iter().skip(offset).take(limit).collect()
}

/// Signed sum of TRANSACTION lines for one `(user, asset)`.
///
/// Equals the account's current balance of that asset when the ledger
/// conservation invariant holds.
pub fn signed_sum(state: &BookState, user: &str, asset: AssetKind) -> Decimal {
    state
        .ledger
        .iter()
        .filter(|entry| entry.user == user && entry.asset() == Some(asset))
        .map(LedgerEntry::signed_amount)
        .sum()
}

/// Journal lines recorded for one order number.
pub fn entries_for_reference(state: &BookState, reference: &str) -> Vec<LedgerEntry> {
    state
        .ledger
        .iter()
        .filter(|entry| entry.reference_number == reference)
        .cloned()
        .collect()
}

/// Aggregates rendered at the top of a client statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub cash_total: Decimal,
    pub gold_total: Decimal,
    pub entry_count: usize,
}

/// Summary plus the most recent lines for statement rendering.
pub fn statement(state: &BookState, user: &str, last: usize) -> (StatementSummary, Vec<LedgerEntry>) {
    let summary = StatementSummary {
        cash_total: signed_sum(state, user, AssetKind::Cash),
        gold_total: signed_sum(state, user, AssetKind::Gold),
        entry_count: state.ledger.iter().filter(|e| e.user == user).count(),
    };
    (summary, entries_for_user(state, user, 0, last))
}
