//! Client account book

use chrono::{DateTime, Utc};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Account may trade
    #[default]
    Active,
    /// Account disabled by the admin
    Inactive,
    /// Account blocked pending review
    Suspended,
    /// Account created but not yet approved
    Pending,
}

/// The client's book: cash and metal balances plus quoting parameters
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Storage identifier
    pub id: String,
    /// Globally unique 5-digit reference code
    pub ref_mid: String,
    /// Display name of the account
    pub account_head: String,
    /// Admin-scoped account code, unique per admin
    pub accode: String,
    /// Free-form account classification
    pub account_type: String,
    /// Cash balance in AED
    pub cash_balance: Decimal,
    /// Metal balance in grams
    pub metal_weight: Decimal,
    /// Margin percentage applied to this account
    pub margin: Decimal,
    /// AED added to the spot price when the client buys
    pub ask_spread: Decimal,
    /// AED subtracted from the spot price when the client sells
    pub bid_spread: Decimal,
    /// Owning admin id; all reads and writes are scoped by it
    pub admin_owner: String,
    /// Phone number used for webhook authorization
    pub phone_number: Option<String>,
    /// Contact email
    pub email: Option<String>,
    pub status: AccountStatus,
    pub kyc_status: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the webhook may act on behalf of this account.
    pub fn can_chat(&self) -> bool {
        self.status == AccountStatus::Active && self.phone_number.is_some()
    }
}

/// Whitelisted profile fields an admin may soft-update.
///
/// Balances are deliberately absent; only the engine mutates those.
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub account_head: Option<String>,
    pub account_type: Option<String>,
    pub margin: Option<Decimal>,
    pub ask_spread: Option<Decimal>,
    pub bid_spread: Option<Decimal>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub status: Option<AccountStatus>,
    pub kyc_status: Option<bool>,
}

/// Payload for admin account creation
#[skip_serializing_none]
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub account_head: String,
    pub accode: String,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub cash_balance: Decimal,
    #[serde(default)]
    pub metal_weight: Decimal,
    #[serde(default)]
    pub margin: Decimal,
    #[serde(default)]
    pub ask_spread: Decimal,
    #[serde(default)]
    pub bid_spread: Decimal,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}
