//! In-memory ACID store for the brokerage book
//!
//! A single `RwLock` guards the whole book. Write transactions run a closure
//! against a cloned state and swap it back on success, so the nine writes of
//! an open or close either all land or none do, and concurrent writers for
//! the same account serialize on the lock.

pub mod ids;

use crate::error::BrokerError;
use crate::model::{Account, LedgerEntry, LpPosition, Order, Transaction};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Every persisted collection of the brokerage
#[derive(Debug, Default, Clone)]
pub struct BookState {
    /// Accounts keyed by storage id
    pub accounts: HashMap<String, Account>,
    /// Orders keyed by storage id
    pub orders: HashMap<String, Order>,
    /// LP positions keyed by `position_id` (the order number)
    pub lp_positions: HashMap<String, LpPosition>,
    /// Append-only journal
    pub ledger: Vec<LedgerEntry>,
    /// Transfers keyed by transaction id
    pub transactions: HashMap<String, Transaction>,
}

impl BookState {
    /// Order lookup scoped by admin; cross-admin access is `NotFound`.
    pub fn order_scoped(&self, order_id: &str, admin_id: &str) -> Result<&Order, BrokerError> {
        self.orders
            .get(order_id)
            .filter(|order| order.admin_id == admin_id)
            .ok_or_else(|| BrokerError::NotFound(format!("order {order_id}")))
    }

    /// Account lookup scoped by admin.
    pub fn account_scoped(
        &self,
        account_id: &str,
        admin_id: &str,
    ) -> Result<&Account, BrokerError> {
        self.accounts
            .get(account_id)
            .filter(|account| account.admin_owner == admin_id)
            .ok_or_else(|| BrokerError::NotFound(format!("account {account_id}")))
    }
}

/// The shared store handle
#[derive(Debug, Default)]
pub struct MemStore {
    state: RwLock<BookState>,
    seq: AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next value of the store-wide sequence.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run a read-only closure against a consistent snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&BookState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Run a write transaction.
    ///
    /// The closure receives a draft clone of the book; if it returns `Ok`
    /// the draft replaces the book atomically, otherwise the book is
    /// untouched and the error surfaces.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut BookState) -> Result<T, BrokerError>,
    ) -> Result<T, BrokerError> {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    /// Find the account a webhook phone belongs to, using the caller-supplied
    /// matcher so normalization rules stay in one place.
    pub fn find_account_by_phone(
        &self,
        matches: impl Fn(&str) -> bool,
    ) -> Option<Account> {
        self.read(|state| {
            state
                .accounts
                .values()
                .find(|account| {
                    account
                        .phone_number
                        .as_deref()
                        .is_some_and(&matches)
                })
                .cloned()
        })
    }
}
