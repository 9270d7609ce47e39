//! The transactional heart of the brokerage
//!
//! `TradingEngine` owns the store and the venue handle; every operation that
//! mutates a balance runs inside one store transaction so its writes appear
//! atomic to readers. Venue calls happen outside the transaction: placement
//! before the open is recorded, close before the settlement is booked.

pub mod close;
pub mod margin;
pub mod open;
pub mod transfer;

pub use close::{CloseTradeReport, VenueCloseOutcome};
pub use margin::BalanceCheck;
pub use open::{OpenTradeReport, OpenTradeRequest};
pub use transfer::TransferRequest;

use crate::bridge::Venue;
use crate::config::{AppConfig, MarginPolicy};
use crate::error::BrokerError;
use crate::model::{Account, AccountStatus, AccountUpdate, NewAccount, Order, OrderStatus};
use crate::store::{MemStore, ids};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Cash and metal balances after an engine operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    /// AED
    pub cash: Decimal,
    /// Grams
    pub gold: Decimal,
}

/// The trading engine, constructed once at startup and shared via `Arc`
pub struct TradingEngine {
    store: Arc<MemStore>,
    venue: Arc<dyn Venue>,
    policy: MarginPolicy,
    symbol: String,
}

impl std::fmt::Debug for TradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingEngine")
            .field("symbol", &self.symbol)
            .finish()
    }
}

impl TradingEngine {
    pub fn new(store: Arc<MemStore>, venue: Arc<dyn Venue>, config: &AppConfig) -> Self {
        Self {
            store,
            venue,
            policy: config.margin,
            symbol: config.symbol.clone(),
        }
    }

    pub fn store(&self) -> &Arc<MemStore> {
        &self.store
    }

    pub fn venue(&self) -> &Arc<dyn Venue> {
        &self.venue
    }

    pub fn policy(&self) -> MarginPolicy {
        self.policy
    }

    /// Venue symbol orders are routed to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Create a client account for an admin.
    ///
    /// Generates the unique 5-digit `ref_mid`; `(accode, admin)` collisions
    /// are a `Conflict`.
    pub fn create_account(
        &self,
        admin_id: &str,
        new: NewAccount,
    ) -> Result<Account, BrokerError> {
        if new.accode.trim().is_empty() {
            return Err(BrokerError::Validation("accode must not be empty".into()));
        }
        let seq = self.store.next_seq();
        let admin = admin_id.to_string();
        self.store.transaction(move |state| {
            let duplicate = state
                .accounts
                .values()
                .any(|acc| acc.accode == new.accode && acc.admin_owner == admin);
            if duplicate {
                return Err(BrokerError::Conflict(format!(
                    "accode {} already exists for this admin",
                    new.accode
                )));
            }

            let taken: HashSet<String> = state
                .accounts
                .values()
                .map(|acc| acc.ref_mid.clone())
                .collect();
            let account = Account {
                id: ids::account_id(seq),
                ref_mid: ids::ref_mid(&taken),
                account_head: new.account_head,
                accode: new.accode,
                account_type: new.account_type,
                cash_balance: new.cash_balance,
                metal_weight: new.metal_weight,
                margin: new.margin,
                ask_spread: new.ask_spread,
                bid_spread: new.bid_spread,
                admin_owner: admin,
                phone_number: new.phone_number,
                email: new.email,
                status: AccountStatus::Active,
                kyc_status: false,
                created_at: Utc::now(),
            };
            info!("account {} created (ref {})", account.id, account.ref_mid);
            state.accounts.insert(account.id.clone(), account.clone());
            Ok(account)
        })
    }

    /// Account lookup, admin-scoped.
    pub fn get_account(&self, admin_id: &str, account_id: &str) -> Result<Account, BrokerError> {
        self.store
            .read(|state| state.account_scoped(account_id, admin_id).cloned())
    }

    /// Soft-update profile fields; balances never pass through here.
    pub fn update_account(
        &self,
        admin_id: &str,
        account_id: &str,
        update: AccountUpdate,
    ) -> Result<Account, BrokerError> {
        let admin = admin_id.to_string();
        let key = account_id.to_string();
        self.store.transaction(move |state| {
            let account = state
                .accounts
                .get_mut(&key)
                .filter(|acc| acc.admin_owner == admin)
                .ok_or_else(|| BrokerError::NotFound(format!("account {key}")))?;

            if let Some(account_head) = update.account_head {
                account.account_head = account_head;
            }
            if let Some(account_type) = update.account_type {
                account.account_type = account_type;
            }
            if let Some(margin) = update.margin {
                account.margin = margin;
            }
            if let Some(ask_spread) = update.ask_spread {
                account.ask_spread = ask_spread;
            }
            if let Some(bid_spread) = update.bid_spread {
                account.bid_spread = bid_spread;
            }
            if let Some(phone_number) = update.phone_number {
                account.phone_number = Some(phone_number);
            }
            if let Some(email) = update.email {
                account.email = Some(email);
            }
            if let Some(status) = update.status {
                account.status = status;
            }
            if let Some(kyc_status) = update.kyc_status {
                account.kyc_status = kyc_status;
            }
            Ok(account.clone())
        })
    }

    /// All orders belonging to an admin, newest first.
    pub fn list_orders(&self, admin_id: &str) -> Vec<Order> {
        self.store.read(|state| {
            let mut orders: Vec<Order> = state
                .orders
                .values()
                .filter(|order| order.admin_id == admin_id)
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.opening_date.cmp(&a.opening_date));
            orders
        })
    }

    /// Order lookup, admin-scoped; cross-admin access is `NotFound`.
    pub fn get_order(&self, admin_id: &str, order_id: &str) -> Result<Order, BrokerError> {
        self.store
            .read(|state| state.order_scoped(order_id, admin_id).cloned())
    }

    /// A user's open (PROCESSING) orders, oldest first so chat indexes
    /// stay stable.
    pub fn open_orders_for_user(&self, user: &str) -> Vec<Order> {
        self.store.read(|state| {
            let mut orders: Vec<Order> = state
                .orders
                .values()
                .filter(|order| order.user == user && order.order_status == OrderStatus::Processing)
                .cloned()
                .collect();
            orders.sort_by(|a, b| a.opening_date.cmp(&b.opening_date));
            orders
        })
    }
}
