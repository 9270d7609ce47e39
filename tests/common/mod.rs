//! Shared fixtures for the integration tests

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use ttb_broker::prelude::*;
use url::Url;

pub const ADMIN: &str = "admin-1";
pub const PHONE: &str = "971501234567";

/// Policy matching the documented sizing example: 50 AED per volume unit,
/// 20% margin on top.
pub fn test_config() -> AppConfig {
    AppConfig {
        symbol: "XAUUSD".into(),
        bridge_command: "true".into(),
        vendor_base_url: Url::parse("https://vendor.test/2010-04-01").expect("static url"),
        api_key: None,
        port: 8080,
        country_prefix: "971".into(),
        margin: MarginPolicy {
            base_amount_per_volume: dec!(50),
            minimum_balance_pct: dec!(20),
            allow_negative_metal: true,
        },
        mt5: None,
        vendor: None,
    }
}

/// Engine over a fresh store and mock venue quoting bid 1900 / ask 1902.
pub fn test_engine() -> (Arc<TradingEngine>, Arc<MockVenue>) {
    setup_logger();
    let store = Arc::new(MemStore::new());
    let venue = Arc::new(MockVenue::new());
    venue.set_price("XAUUSD", dec!(1900), dec!(1902));
    let engine = Arc::new(TradingEngine::new(store, venue.clone(), &test_config()));
    (engine, venue)
}

/// Create an account with 0.5 AED spreads both ways and fund it with cash
/// through the engine, so the journal covers the full balance.
pub fn funded_account(engine: &TradingEngine, cash: Decimal) -> Account {
    let account = engine
        .create_account(
            ADMIN,
            NewAccount {
                account_head: "Test Client".into(),
                accode: "AC001".into(),
                account_type: "retail".into(),
                cash_balance: Decimal::ZERO,
                metal_weight: Decimal::ZERO,
                margin: Decimal::ZERO,
                ask_spread: dec!(0.5),
                bid_spread: dec!(0.5),
                phone_number: Some(PHONE.into()),
                email: None,
            },
        )
        .expect("account creation");
    if cash > Decimal::ZERO {
        engine
            .create_transaction(
                ADMIN,
                TransferRequest {
                    txn_type: TransactionType::Deposit,
                    asset: AssetKind::Cash,
                    amount: cash,
                    user: account.id.clone(),
                },
            )
            .expect("funding deposit");
    }
    engine
        .get_account(ADMIN, &account.id)
        .expect("account readback")
}

/// Standard BUY request for the seed scenario: 0.01 g at ask 1902 with an
/// explicit margin of 19.025 AED.
pub fn seed_buy_request() -> OpenTradeRequest {
    OpenTradeRequest {
        symbol: "GOLD".into(),
        side: OrderSide::Buy,
        volume: dec!(0.01),
        spot: dec!(1902),
        required_margin: Some(dec!(19.025)),
        opening_date: None,
        ticket: None,
        comment: None,
    }
}
