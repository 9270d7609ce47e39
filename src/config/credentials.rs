use crate::error::BrokerError;
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Credentials for the MetaTrader 5 terminal behind the bridge subprocess
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct Mt5Credentials {
    /// Broker server name, e.g. "MetaQuotes-Demo"
    pub server: Option<String>,
    /// Terminal login
    pub login: Option<String>,
    /// Terminal password
    pub password: Option<String>,
}

impl Mt5Credentials {
    /// Validates whether all terminal credentials are present.
    pub fn is_valid(&self) -> bool {
        self.server.is_some() && self.login.is_some() && self.password.is_some()
    }

    /// Creates credentials from `MT5_SERVER`, `MT5_LOGIN` and `MT5_PASSWORD`.
    ///
    /// Returns `Err(BrokerError::Config)` when any of the three is missing;
    /// the bridge cannot start without a complete set.
    pub fn new() -> Result<Self, BrokerError> {
        let creds = Self::default();
        if creds.is_valid() {
            Ok(creds)
        } else {
            warn!("MT5 credentials are not fully set; the upstream bridge will be unavailable");
            Err(BrokerError::Config(
                "MT5 credentials are not properly set in environment variables".into(),
            ))
        }
    }
}

impl Default for Mt5Credentials {
    fn default() -> Self {
        dotenv::dotenv().ok();
        Self {
            server: env::var("MT5_SERVER").ok(),
            login: env::var("MT5_LOGIN").ok(),
            password: env::var("MT5_PASSWORD").ok(),
        }
    }
}

/// Credentials for the outbound messaging vendor
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct VendorCredentials {
    /// Vendor account identifier
    pub account_sid: Option<String>,
    /// Vendor auth token, also the webhook signature key
    pub auth_token: Option<String>,
    /// Sender id messages are dispatched from
    pub from_number: Option<String>,
}

impl VendorCredentials {
    /// Validates whether all vendor credentials are present.
    pub fn is_valid(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }

    /// Creates credentials from `VENDOR_ACCOUNT_SID`, `VENDOR_AUTH_TOKEN`
    /// and `VENDOR_FROM_NUMBER`.
    pub fn new() -> Result<Self, BrokerError> {
        let creds = Self::default();
        if creds.is_valid() {
            Ok(creds)
        } else {
            warn!("Vendor credentials are not fully set; outbound messages will fail");
            Err(BrokerError::Config(
                "Messaging vendor credentials are not properly set in environment variables"
                    .into(),
            ))
        }
    }

    /// Account sid and auth token pair for HTTP basic auth against the vendor.
    pub fn basic_auth(&self) -> Result<(String, String), BrokerError> {
        match (&self.account_sid, &self.auth_token) {
            (Some(sid), Some(token)) => Ok((sid.clone(), token.clone())),
            _ => Err(BrokerError::Config(
                "Account SID and auth token must be set for vendor authentication".into(),
            )),
        }
    }
}

impl Default for VendorCredentials {
    fn default() -> Self {
        dotenv::dotenv().ok();
        Self {
            account_sid: env::var("VENDOR_ACCOUNT_SID").ok(),
            auth_token: env::var("VENDOR_AUTH_TOKEN").ok(),
            from_number: env::var("VENDOR_FROM_NUMBER").ok(),
        }
    }
}
