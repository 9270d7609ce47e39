//! Deposits, withdrawals and their status transitions

use crate::engine::TradingEngine;
use crate::error::BrokerError;
use crate::ledger::JournalWriter;
use crate::model::{
    AssetKind, EntryNature, LedgerEntry, Transaction, TransactionStatus, TransactionType,
};
use crate::store::ids;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Request to move cash or metal in or out of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub asset: AssetKind,
    pub amount: Decimal,
    /// Account id the transfer applies to
    pub user: String,
}

impl TradingEngine {
    /// Apply a deposit or withdrawal atomically: balance mutation, the
    /// transfer record and one journal line in a single transaction.
    pub fn create_transaction(
        &self,
        admin_id: &str,
        request: TransferRequest,
    ) -> Result<(Transaction, LedgerEntry), BrokerError> {
        if request.amount <= Decimal::ZERO {
            return Err(BrokerError::Validation(
                "transfer amount must be positive".into(),
            ));
        }

        let txn_seq = self.store().next_seq();
        let entry_seq = self.store().next_seq();
        let admin = admin_id.to_string();

        self.store().transaction(move |state| {
            let account = state
                .accounts
                .get_mut(&request.user)
                .filter(|acc| acc.admin_owner == admin)
                .ok_or_else(|| BrokerError::NotFound(format!("account {}", request.user)))?;

            let previous_balance = match request.asset {
                AssetKind::Cash => account.cash_balance,
                AssetKind::Gold => account.metal_weight,
            };
            if request.txn_type == TransactionType::Withdrawal
                && previous_balance < request.amount
            {
                return Err(BrokerError::InsufficientBalance(format!(
                    "withdrawal of {} exceeds {} balance {previous_balance}",
                    request.amount, request.asset
                )));
            }

            let new_balance = match request.txn_type {
                TransactionType::Deposit => previous_balance + request.amount,
                TransactionType::Withdrawal => previous_balance - request.amount,
            };
            match request.asset {
                AssetKind::Cash => account.cash_balance = new_balance,
                AssetKind::Gold => account.metal_weight = new_balance,
            }

            let date = Utc::now();
            let transaction = Transaction {
                transaction_id: ids::transaction_id(txn_seq),
                txn_type: request.txn_type,
                asset: request.asset,
                amount: request.amount,
                previous_balance,
                new_balance,
                status: TransactionStatus::Completed,
                user: request.user.clone(),
                admin_id: admin.clone(),
                date,
            };

            let journal =
                JournalWriter::new(&request.user, &admin, &transaction.transaction_id, date);
            let entry = journal.transaction(
                ids::trx_entry_id(entry_seq),
                match request.txn_type {
                    TransactionType::Deposit => EntryNature::Credit,
                    TransactionType::Withdrawal => EntryNature::Debit,
                },
                request.asset,
                request.amount,
                new_balance,
                previous_balance,
                match request.txn_type {
                    TransactionType::Deposit => "Deposit",
                    TransactionType::Withdrawal => "Withdrawal",
                },
            );
            state.ledger.push(entry.clone());

            info!(
                "{:?} {} {} for {}: {previous_balance} -> {new_balance}",
                request.txn_type, request.amount, request.asset, request.user
            );

            state
                .transactions
                .insert(transaction.transaction_id.clone(), transaction.clone());
            Ok((transaction, entry))
        })
    }

    /// Move a transfer to a new status.
    ///
    /// `COMPLETED -> CANCELLED | FAILED` reverses the original balance
    /// delta; `PENDING -> COMPLETED` applies it. Both run atomically and
    /// journal the mutation.
    pub fn update_transaction_status(
        &self,
        admin_id: &str,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<Transaction, BrokerError> {
        let entry_seq = self.store().next_seq();
        let admin = admin_id.to_string();
        let txn_key = transaction_id.to_string();

        self.store().transaction(move |state| {
            let transaction = state
                .transactions
                .get(&txn_key)
                .filter(|txn| txn.admin_id == admin)
                .cloned()
                .ok_or_else(|| BrokerError::NotFound(format!("transaction {txn_key}")))?;

            if transaction.status == status {
                return Ok(transaction);
            }

            let reverse = transaction.status == TransactionStatus::Completed
                && matches!(
                    status,
                    TransactionStatus::Cancelled | TransactionStatus::Failed
                );
            let apply = transaction.status == TransactionStatus::Pending
                && status == TransactionStatus::Completed;
            if !reverse && !apply && transaction.status != TransactionStatus::Pending {
                return Err(BrokerError::Validation(format!(
                    "cannot move transaction {txn_key} from {:?} to {status:?}",
                    transaction.status
                )));
            }

            let mut updated = transaction.clone();
            updated.status = status;

            if reverse || apply {
                let account = state
                    .accounts
                    .get_mut(&transaction.user)
                    .ok_or_else(|| {
                        BrokerError::NotFound(format!("account {}", transaction.user))
                    })?;
                let delta = if reverse {
                    -transaction.delta()
                } else {
                    transaction.delta()
                };
                let previous = match transaction.asset {
                    AssetKind::Cash => account.cash_balance,
                    AssetKind::Gold => account.metal_weight,
                };
                let next = previous + delta;
                if next < Decimal::ZERO {
                    return Err(BrokerError::InsufficientBalance(format!(
                        "reversal of transaction {txn_key} would overdraw the {} balance",
                        transaction.asset
                    )));
                }
                match transaction.asset {
                    AssetKind::Cash => account.cash_balance = next,
                    AssetKind::Gold => account.metal_weight = next,
                }

                let journal = JournalWriter::new(
                    &transaction.user,
                    &admin,
                    &transaction.transaction_id,
                    Utc::now(),
                );
                let entry = journal.transaction(
                    ids::trx_entry_id(entry_seq),
                    if delta >= Decimal::ZERO {
                        EntryNature::Credit
                    } else {
                        EntryNature::Debit
                    },
                    transaction.asset,
                    delta.abs(),
                    next,
                    previous,
                    if reverse {
                        "Transfer reversed"
                    } else {
                        "Transfer applied"
                    },
                );
                state.ledger.push(entry);
            }

            state
                .transactions
                .insert(updated.transaction_id.clone(), updated.clone());
            info!(
                "transaction {} moved to {status:?}",
                updated.transaction_id
            );
            Ok(updated)
        })
    }
}
