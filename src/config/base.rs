//! Base configuration for the brokerage engine

use crate::config::credentials::{Mt5Credentials, VendorCredentials};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use url::Url;

const DEFAULT_VENDOR_BASE_URL: &str = "https://api.messaging.example.com/2010-04-01";
const DEFAULT_SYMBOL: &str = "XAUUSD";
const DEFAULT_COUNTRY_PREFIX: &str = "971";

/// Cash reserved per volume unit when sizing an order
const DEFAULT_BASE_AMOUNT_PER_VOLUME: Decimal = dec!(400);
/// Margin percentage applied on top of the base amount
const DEFAULT_MINIMUM_BALANCE_PCT: Decimal = dec!(20);

/// Margin sizing policy applied before an order reaches the engine
#[derive(DebugPretty, DisplaySimple, Clone, Copy, Serialize, Deserialize)]
pub struct MarginPolicy {
    /// AED reserved per unit of volume
    pub base_amount_per_volume: Decimal,
    /// Percentage of the base amount held as margin
    pub minimum_balance_pct: Decimal,
    /// Whether SELL exposure may push the metal balance negative
    pub allow_negative_metal: bool,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            base_amount_per_volume: DEFAULT_BASE_AMOUNT_PER_VOLUME,
            minimum_balance_pct: DEFAULT_MINIMUM_BALANCE_PCT,
            allow_negative_metal: true,
        }
    }
}

impl MarginPolicy {
    /// Margin multiplier `1 + pct/100` used when sizing the cash requirement.
    pub fn multiplier(&self) -> Decimal {
        Decimal::ONE + self.minimum_balance_pct / dec!(100)
    }
}

/// Configuration for the brokerage engine
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Venue symbol orders are routed to
    pub symbol: String,
    /// Command line used to spawn the bridge subprocess, e.g. "python3 mt5_bridge.py"
    pub bridge_command: String,
    /// Base URL of the messaging vendor REST API
    pub vendor_base_url: Url,
    /// API key expected on the admin surface
    pub api_key: Option<String>,
    /// Port the HTTP shell should bind
    pub port: u16,
    /// Country prefix tried during phone authorization
    pub country_prefix: String,
    /// Margin sizing policy
    pub margin: MarginPolicy,
    /// MT5 terminal credentials
    pub mt5: Option<Mt5Credentials>,
    /// Messaging vendor credentials
    pub vendor: Option<VendorCredentials>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppConfig {
    /// Read the full configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let symbol = env::var("TTB_SYMBOL").unwrap_or_else(|_| DEFAULT_SYMBOL.to_string());

        let bridge_command =
            env::var("TTB_BRIDGE_COMMAND").unwrap_or_else(|_| "python3 mt5_bridge.py".to_string());

        let vendor_base_url = env::var("VENDOR_BASE_URL")
            .ok()
            .and_then(|raw| Url::parse(&raw).ok())
            .unwrap_or_else(|| {
                Url::parse(DEFAULT_VENDOR_BASE_URL).expect("Invalid default vendor URL")
            });

        let port = env::var("PORT")
            .map(|val| val.parse::<u16>().unwrap_or(8080))
            .unwrap_or(8080);

        let country_prefix =
            env::var("TTB_COUNTRY_PREFIX").unwrap_or_else(|_| DEFAULT_COUNTRY_PREFIX.to_string());

        let margin = MarginPolicy {
            base_amount_per_volume: decimal_env(
                "TTB_BASE_AMOUNT_PER_VOLUME",
                DEFAULT_BASE_AMOUNT_PER_VOLUME,
            ),
            minimum_balance_pct: decimal_env(
                "TTB_MINIMUM_BALANCE_PCT",
                DEFAULT_MINIMUM_BALANCE_PCT,
            ),
            allow_negative_metal: env::var("TTB_ALLOW_NEGATIVE_METAL")
                .map(|val| val.to_lowercase() != "false")
                .unwrap_or(true),
        };

        Self {
            symbol,
            bridge_command,
            vendor_base_url,
            api_key: env::var("TTB_API_KEY").ok(),
            port,
            country_prefix,
            margin,
            mt5: Mt5Credentials::new().ok(),
            vendor: VendorCredentials::new().ok(),
        }
    }

    /// Set the venue symbol
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Set the margin policy
    pub fn with_margin(mut self, margin: MarginPolicy) -> Self {
        self.margin = margin;
        self
    }

    /// Set the messaging vendor base URL
    pub fn with_vendor_base_url(mut self, base_url: Url) -> Self {
        self.vendor_base_url = base_url;
        self
    }
}

fn decimal_env(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|val| Decimal::from_str(&val).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_multiplier() {
        let policy = MarginPolicy {
            base_amount_per_volume: dec!(50),
            minimum_balance_pct: dec!(20),
            allow_negative_metal: true,
        };
        assert_eq!(policy.multiplier(), dec!(1.2));
    }

    #[test]
    fn test_default_policy_allows_negative_metal() {
        assert!(MarginPolicy::default().allow_negative_metal);
    }
}
