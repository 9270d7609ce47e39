//! Conversational flow tests: menu, quoting, confirmation and closing
//! through the session state machine.

mod common;

use common::{ADMIN, PHONE, funded_account, test_engine};
use rust_decimal_macros::dec;
use std::sync::Arc;
use ttb_broker::chat::SessionHandler;
use ttb_broker::prelude::*;

fn setup() -> (Arc<TradingEngine>, Arc<MockVenue>, SessionHandler, ChatSession, Account) {
    let (engine, venue) = test_engine();
    let account = funded_account(&engine, dec!(100000));
    let market = Arc::new(MarketDataService::new(venue.clone() as Arc<dyn Venue>));
    let handler = SessionHandler::new(Arc::clone(&engine), market);
    let session = ChatSession::new(PHONE, &account.id);
    (engine, venue, handler, session, account)
}

#[tokio::test]
async fn test_greeting_moves_to_main_menu() {
    let (_engine, _venue, handler, mut session, _account) = setup();
    let reply = handler.handle(&mut session, "hi").await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(reply.text.contains("Menu"));
}

#[tokio::test]
async fn test_quick_buy_quotes_and_asks_for_confirmation() {
    let (_engine, _venue, handler, mut session, _account) = setup();

    let reply = handler.handle(&mut session, "BUY 1 TTB").await;

    assert_eq!(session.state, ChatState::ConfirmOrder);
    let pending = session.pending_order.clone().expect("pending order");
    assert_eq!(pending.side, OrderSide::Buy);
    assert_eq!(pending.volume, dec!(1));
    // Ask 1902 plus the 0.5 account spread.
    assert_eq!(pending.price, dec!(1902.5));
    assert!(reply.text.contains("Confirm BUY 1 TTB"));
    assert!(reply.text.contains("Live"));
}

#[tokio::test]
async fn test_confirmation_places_the_order() {
    let (engine, venue, handler, mut session, account) = setup();
    handler.handle(&mut session, "2TTB").await;

    let reply = handler.handle(&mut session, "y").await;

    assert_eq!(session.state, ChatState::MainMenu);
    assert!(session.pending_order.is_none());
    assert!(reply.text.contains("placed"));
    assert!(reply.related_order.is_some());
    assert_eq!(venue.placed().len(), 1);

    let orders = engine.open_orders_for_user(&account.id);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].volume, dec!(2));
    assert_eq!(orders[0].side, OrderSide::Buy);
}

#[tokio::test]
async fn test_decline_returns_to_menu_without_an_order() {
    let (engine, venue, handler, mut session, account) = setup();
    handler.handle(&mut session, "BUY 1").await;

    let reply = handler.handle(&mut session, "N").await;

    assert_eq!(session.state, ChatState::MainMenu);
    assert!(session.pending_order.is_none());
    assert!(reply.text.contains("cancelled"));
    assert!(venue.placed().is_empty());
    assert!(engine.open_orders_for_user(&account.id).is_empty());
}

#[tokio::test]
async fn test_side_then_volume_flow_keeps_the_chosen_side() {
    let (_engine, _venue, handler, mut session, _account) = setup();

    let reply = handler.handle(&mut session, "SELL").await;
    assert_eq!(session.state, ChatState::AwaitingVolume);
    assert!(reply.text.contains("SELL"));

    handler.handle(&mut session, "3").await;
    assert_eq!(session.state, ChatState::ConfirmOrder);
    let pending = session.pending_order.clone().expect("pending order");
    assert_eq!(pending.side, OrderSide::Sell);
    assert_eq!(pending.volume, dec!(3));
    // Bid 1900 minus the 0.5 account spread.
    assert_eq!(pending.price, dec!(1899.5));
}

#[tokio::test]
async fn test_insufficient_balance_rejects_before_confirmation() {
    let (engine, _venue, handler, _session, _account) = setup();
    // A second account with nothing on it.
    let poor = engine
        .create_account(
            ADMIN,
            NewAccount {
                account_head: "Poor".into(),
                accode: "AC002".into(),
                account_type: String::new(),
                cash_balance: dec!(0),
                metal_weight: dec!(0),
                margin: dec!(0),
                ask_spread: dec!(0.5),
                bid_spread: dec!(0.5),
                phone_number: Some("971509999999".into()),
                email: None,
            },
        )
        .unwrap();
    let mut session = ChatSession::new("971509999999", &poor.id);

    let reply = handler.handle(&mut session, "BUY 10").await;

    assert_ne!(session.state, ChatState::ConfirmOrder);
    assert!(session.pending_order.is_none());
    assert!(reply.text.contains("Insufficient") || reply.text.contains("balance"));
}

#[tokio::test]
async fn test_close_by_index_settles_the_order() {
    let (engine, venue, handler, mut session, account) = setup();
    handler.handle(&mut session, "BUY 1").await;
    handler.handle(&mut session, "Y").await;

    // Price rallies before the close.
    venue.set_price("XAUUSD", dec!(1910), dec!(1912));
    let reply = handler.handle(&mut session, "CLOSE 1").await;

    assert!(reply.text.contains("closed"), "got: {}", reply.text);
    assert!(engine.open_orders_for_user(&account.id).is_empty());
    assert_eq!(venue.closed().len(), 1);
}

#[tokio::test]
async fn test_close_with_bad_index_explains_itself() {
    let (_engine, _venue, handler, mut session, _account) = setup();
    let reply = handler.handle(&mut session, "CLOSE 3").await;
    assert!(reply.text.contains("No open order"));
}

#[tokio::test]
async fn test_balance_and_price_commands() {
    let (_engine, _venue, handler, mut session, account) = setup();

    let balance = handler.handle(&mut session, "balance").await;
    assert!(balance.text.contains(&account.ref_mid));
    assert!(balance.text.contains("100000"));

    let price = handler.handle(&mut session, "price").await;
    assert!(price.text.contains("TTB price"));
    assert!(price.text.contains("Live"));
}

#[tokio::test]
async fn test_statement_lists_recent_entries() {
    let (_engine, _venue, handler, mut session, _account) = setup();
    handler.handle(&mut session, "BUY 1").await;
    handler.handle(&mut session, "Y").await;

    let reply = handler.handle(&mut session, "statement").await;
    assert_eq!(session.state, ChatState::Statement);
    assert!(reply.text.contains("Statement"));
    assert!(reply.text.contains("Margin held"));

    // Any next message drops back to the menu.
    let next = handler.handle(&mut session, "ok").await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(next.text.contains("Menu"));
}

#[tokio::test]
async fn test_reset_clears_a_half_built_order() {
    let (_engine, _venue, handler, mut session, _account) = setup();
    handler.handle(&mut session, "BUY 1").await;
    assert_eq!(session.state, ChatState::ConfirmOrder);

    handler.handle(&mut session, "reset").await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(session.pending_order.is_none());
}

#[tokio::test]
async fn test_orders_command_lists_open_positions() {
    let (_engine, _venue, handler, mut session, _account) = setup();
    handler.handle(&mut session, "BUY 1").await;
    handler.handle(&mut session, "Y").await;

    let reply = handler.handle(&mut session, "orders").await;
    assert!(reply.text.contains("1. ORD-"));
    assert_eq!(session.open_orders.len(), 1);
}
