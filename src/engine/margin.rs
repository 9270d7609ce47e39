//! Balance sufficiency and maximum-volume policy

use crate::engine::TradingEngine;
use crate::error::BrokerError;
use crate::model::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Full report of a balance check, rendered to the client on rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub ok: bool,
    pub user_balance: Decimal,
    /// Cash needed for the requested volume before margin
    pub base_amount: Decimal,
    /// Margin on top of the base amount
    pub margin_amount: Decimal,
    /// `base_amount + margin_amount`
    pub total_required: Decimal,
    /// Volume already open in PROCESSING orders
    pub existing_volume: Decimal,
    /// Cash already committed to that existing volume
    pub existing_amount: Decimal,
    /// Total the balance must cover, existing exposure included
    pub total_needed: Decimal,
    pub remaining_balance: Decimal,
    /// Largest whole volume the free balance still admits
    pub max_allowed_volume: Decimal,
    pub message: String,
}

impl TradingEngine {
    /// Whether `account_id` can afford a new order of `volume`, given its
    /// existing open exposure and the configured margin policy.
    pub fn check_sufficient_balance(
        &self,
        account_id: &str,
        volume: Decimal,
    ) -> Result<BalanceCheck, BrokerError> {
        let policy = self.policy();
        let per_volume = policy.base_amount_per_volume;
        let multiplier = policy.multiplier();

        self.store().read(|state| {
            let account = state
                .accounts
                .get(account_id)
                .ok_or_else(|| BrokerError::NotFound(format!("account {account_id}")))?;

            let user_balance = account.cash_balance;
            let base_amount = volume * per_volume;
            let margin_amount = base_amount * policy.minimum_balance_pct / Decimal::ONE_HUNDRED;
            let total_required = base_amount + margin_amount;

            let existing_volume: Decimal = state
                .orders
                .values()
                .filter(|order| {
                    order.user == account_id && order.order_status == OrderStatus::Processing
                })
                .map(|order| order.volume)
                .sum();
            let existing_amount = existing_volume * per_volume * multiplier;

            let total_needed = total_required + existing_amount;
            let remaining_balance = user_balance - total_needed;

            let free = user_balance - existing_amount;
            let unit_cost = per_volume * multiplier;
            let max_allowed_volume = if unit_cost > Decimal::ZERO && free > Decimal::ZERO {
                (free / unit_cost).floor()
            } else {
                Decimal::ZERO
            };

            let ok = remaining_balance >= Decimal::ZERO && volume > Decimal::ZERO;
            let message = if ok {
                format!(
                    "Balance check passed: {total_needed} AED needed, {user_balance} AED available"
                )
            } else if volume <= Decimal::ZERO {
                "Volume must be greater than zero".to_string()
            } else {
                format!(
                    "Insufficient balance: {total_needed} AED needed but only {user_balance} AED \
                     available. Largest volume currently allowed: {max_allowed_volume}"
                )
            };

            Ok(BalanceCheck {
                ok,
                user_balance,
                base_amount,
                margin_amount,
                total_required,
                existing_volume,
                existing_amount,
                total_needed,
                remaining_balance,
                max_allowed_volume,
                message,
            })
        })
    }
}
