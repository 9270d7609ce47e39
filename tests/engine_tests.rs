//! Engine lifecycle tests: open, close, cancel, transfers and the
//! accounting invariants they must preserve.

mod common;

use common::{ADMIN, funded_account, seed_buy_request, test_engine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ttb_broker::ledger;
use ttb_broker::pricing::gold_weight_value;
use ttb_broker::prelude::*;

#[test]
fn test_open_buy_books_margin_metal_and_four_entries() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));

    let report = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();

    assert_eq!(report.order.order_status, OrderStatus::Processing);
    assert_eq!(report.order.opening_price, dec!(1902.5));
    assert_eq!(report.required_margin, dec!(19.025));
    assert_eq!(report.balances.cash, dec!(9980.975));
    assert_eq!(report.balances.gold, dec!(0.01));
    assert_eq!(report.ledger_entries.len(), 4);

    let account = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account.cash_balance, dec!(9980.975));
    assert_eq!(account.metal_weight, dec!(0.01));

    // Exactly four journal lines reference the order, in writing order.
    let rows = engine
        .store()
        .read(|state| ledger::entries_for_reference(state, &report.order.order_no));
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].entry_type, EntryType::Order);
    assert_eq!(rows[0].entry_nature, EntryNature::Debit);
    assert_eq!(rows[0].running_balance, dec!(9980.975));
    assert_eq!(rows[1].entry_type, EntryType::LpPosition);
    assert_eq!(rows[2].asset(), Some(AssetKind::Cash));
    assert_eq!(rows[3].asset(), Some(AssetKind::Gold));
    assert_eq!(rows[3].entry_nature, EntryNature::Credit);
    assert_eq!(rows[3].running_balance, dec!(0.01));
}

#[test]
fn test_open_pairs_order_with_lp_mirror() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));

    let report = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();

    let lp = report.lp_position;
    assert_eq!(lp.position_id, report.order.order_no);
    assert_eq!(Some(lp.position_id.clone()), report.order.lp_position_id);
    assert_eq!(lp.volume, report.order.volume);
    assert_eq!(lp.side, report.order.side);
    assert_eq!(lp.symbol, report.order.symbol);
    // The mirror carries the raw spot, the order the spread-adjusted quote.
    assert_eq!(lp.entry_price, dec!(1902));
    assert_eq!(lp.status, PositionStatus::Open);
}

#[test]
fn test_close_buy_settles_profit_and_metal() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();

    // Market moved to bid 1904; closing a buy exits at 1904 - 0.5.
    let report = engine
        .close_trade(ADMIN, &opened.order.id, OrderUpdate::close_at(dec!(1904)))
        .unwrap();

    assert_eq!(report.order.order_status, OrderStatus::Closed);
    assert_eq!(report.client_profit, dec!(0.01));
    assert_eq!(report.order.profit, dec!(0.01));
    assert!(report.order.closing_date.is_some());
    assert_eq!(report.settlement_amount, Some(dec!(19.025)));
    assert_eq!(report.balances.cash, dec!(10000.01));
    assert_eq!(report.balances.gold, Decimal::ZERO);
    assert_eq!(report.ledger_entries.len(), 4);

    let lp = report.lp_position;
    assert_eq!(lp.status, PositionStatus::Closed);
    assert_eq!(lp.closing_price, Some(dec!(1904)));

    // Broker profit is the spread captured on both legs.
    let expected = (gold_weight_value(dec!(1902), dec!(0.01))
        - gold_weight_value(dec!(1902.5), dec!(0.01)))
    .abs()
        + (gold_weight_value(dec!(1904), dec!(0.01))
            - gold_weight_value(dec!(1903.5), dec!(0.01)))
        .abs();
    assert_eq!(lp.profit, expected);
}

#[test]
fn test_ledger_conservation_over_open_and_close() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();
    engine
        .close_trade(ADMIN, &opened.order.id, OrderUpdate::close_at(dec!(1904)))
        .unwrap();

    let account = engine.get_account(ADMIN, &account.id).unwrap();
    let (cash_sum, gold_sum) = engine.store().read(|state| {
        (
            ledger::signed_sum(state, &account.id, AssetKind::Cash),
            ledger::signed_sum(state, &account.id, AssetKind::Gold),
        )
    });
    assert_eq!(cash_sum, account.cash_balance);
    assert_eq!(gold_sum, account.metal_weight);

    let rows = engine
        .store()
        .read(|state| ledger::entries_for_reference(state, &opened.order.order_no));
    assert_eq!(rows.len(), 8, "four rows per leg");
}

#[test]
fn test_round_trip_at_same_spot_costs_both_spreads() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();

    let report = engine
        .close_trade(ADMIN, &opened.order.id, OrderUpdate::close_at(dec!(1902)))
        .unwrap();

    // 0.5 AED lost on each side of the trip.
    assert_eq!(report.client_profit, dec!(-0.0100));
    assert_eq!(report.order.profit, dec!(-0.01));
}

#[test]
fn test_sell_open_and_close_mirror_the_buy_deltas() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));

    let opened = engine
        .open_trade(
            ADMIN,
            &account.id,
            OpenTradeRequest {
                side: OrderSide::Sell,
                spot: dec!(1900),
                ..seed_buy_request()
            },
        )
        .unwrap();
    // Sell quotes below spot and goes short metal.
    assert_eq!(opened.order.opening_price, dec!(1899.5));
    assert_eq!(opened.balances.gold, dec!(-0.01));

    // Market dropped; closing a sell exits at ask + spread.
    let report = engine
        .close_trade(ADMIN, &opened.order.id, OrderUpdate::close_at(dec!(1897)))
        .unwrap();
    assert_eq!(report.client_profit, (dec!(1899.5) - dec!(1897.5)) * dec!(0.01));
    assert_eq!(report.balances.gold, Decimal::ZERO);
}

#[test]
fn test_closing_a_closed_order_is_a_conflict() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();
    engine
        .close_trade(ADMIN, &opened.order.id, OrderUpdate::close_at(dec!(1904)))
        .unwrap();

    let second = engine.close_trade(ADMIN, &opened.order.id, OrderUpdate::close_at(dec!(1905)));
    assert!(matches!(second, Err(BrokerError::Conflict(_))));
}

#[test]
fn test_cancel_reverses_the_open() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();

    let report = engine
        .close_trade(
            ADMIN,
            &opened.order.id,
            OrderUpdate {
                order_status: Some(OrderStatus::Cancelled),
                ..OrderUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(report.order.order_status, OrderStatus::Cancelled);
    assert_eq!(report.balances.cash, dec!(10000));
    assert_eq!(report.balances.gold, Decimal::ZERO);
    assert_eq!(report.order.profit, Decimal::ZERO);

    let account = engine.get_account(ADMIN, &account.id).unwrap();
    let cash_sum = engine
        .store()
        .read(|state| ledger::signed_sum(state, &account.id, AssetKind::Cash));
    assert_eq!(cash_sum, account.cash_balance);
}

#[test]
fn test_balance_check_reports_max_allowed_volume() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(100));

    // 10 volumes at 50 AED + 20% margin needs 600 AED against 100 held.
    let check = engine
        .check_sufficient_balance(&account.id, dec!(10))
        .unwrap();
    assert!(!check.ok);
    assert_eq!(check.base_amount, dec!(500));
    assert_eq!(check.margin_amount, dec!(100));
    assert_eq!(check.total_required, dec!(600));
    assert_eq!(check.remaining_balance, dec!(-500));
    assert_eq!(check.max_allowed_volume, dec!(1));
    assert!(check.message.contains("Insufficient"));
}

#[test]
fn test_balance_check_counts_existing_exposure() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    engine
        .open_trade(
            ADMIN,
            &account.id,
            OpenTradeRequest {
                volume: dec!(2),
                required_margin: Some(dec!(100)),
                ..seed_buy_request()
            },
        )
        .unwrap();

    let check = engine.check_sufficient_balance(&account.id, dec!(1)).unwrap();
    assert_eq!(check.existing_volume, dec!(2));
    // 2 volumes already commit 2 * 50 * 1.2 = 120 AED.
    assert_eq!(check.existing_amount, dec!(120));
    assert_eq!(check.total_needed, dec!(60) + dec!(120));
    assert!(check.ok);
}

#[test]
fn test_deposit_then_overdraw_withdrawal() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, Decimal::ZERO);

    engine
        .create_transaction(
            ADMIN,
            TransferRequest {
                txn_type: TransactionType::Deposit,
                asset: AssetKind::Cash,
                amount: dec!(500),
                user: account.id.clone(),
            },
        )
        .unwrap();
    let account_after = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account_after.cash_balance, dec!(500));
    let cash_sum = engine
        .store()
        .read(|state| ledger::signed_sum(state, &account.id, AssetKind::Cash));
    assert_eq!(cash_sum, dec!(500));

    let overdraw = engine.create_transaction(
        ADMIN,
        TransferRequest {
            txn_type: TransactionType::Withdrawal,
            asset: AssetKind::Cash,
            amount: dec!(600),
            user: account.id.clone(),
        },
    );
    assert!(matches!(overdraw, Err(BrokerError::InsufficientBalance(_))));

    // Failed withdrawal leaves both the balance and the journal untouched.
    let account_after = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account_after.cash_balance, dec!(500));
    let cash_sum = engine
        .store()
        .read(|state| ledger::signed_sum(state, &account.id, AssetKind::Cash));
    assert_eq!(cash_sum, dec!(500));
}

#[test]
fn test_deposit_withdrawal_round_trip_sums_to_zero() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, Decimal::ZERO);

    for txn_type in [TransactionType::Deposit, TransactionType::Withdrawal] {
        engine
            .create_transaction(
                ADMIN,
                TransferRequest {
                    txn_type,
                    asset: AssetKind::Gold,
                    amount: dec!(5),
                    user: account.id.clone(),
                },
            )
            .unwrap();
    }

    let account_after = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account_after.metal_weight, Decimal::ZERO);
    let gold_sum = engine
        .store()
        .read(|state| ledger::signed_sum(state, &account.id, AssetKind::Gold));
    assert_eq!(gold_sum, Decimal::ZERO);
}

#[test]
fn test_completed_transaction_reversal_restores_balance() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, Decimal::ZERO);

    let (txn, _entry) = engine
        .create_transaction(
            ADMIN,
            TransferRequest {
                txn_type: TransactionType::Deposit,
                asset: AssetKind::Cash,
                amount: dec!(500),
                user: account.id.clone(),
            },
        )
        .unwrap();

    let updated = engine
        .update_transaction_status(ADMIN, &txn.transaction_id, TransactionStatus::Cancelled)
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Cancelled);

    let account_after = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account_after.cash_balance, Decimal::ZERO);
    let cash_sum = engine
        .store()
        .read(|state| ledger::signed_sum(state, &account.id, AssetKind::Cash));
    assert_eq!(cash_sum, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transient_retcodes_yield_one_order() {
    let (engine, venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));

    // Venue requotes twice before accepting.
    venue.script_place_retcodes([10020, 10020]);

    let report = engine
        .execute_order(ADMIN, &account.id, seed_buy_request())
        .await
        .unwrap();

    assert!(report.order.ticket.is_some());
    assert_eq!(venue.placed().len(), 1, "one placement request");
    let order_count = engine.store().read(|state| state.orders.len());
    assert_eq!(order_count, 1, "no duplicate orders persisted");
    let rows = engine
        .store()
        .read(|state| ledger::entries_for_reference(state, &report.order.order_no));
    assert_eq!(rows.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_hard_retcode_persists_nothing() {
    let (engine, venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    venue.script_place_retcodes([10018]);

    let result = engine
        .execute_order(ADMIN, &account.id, seed_buy_request())
        .await;
    assert!(matches!(
        result,
        Err(BrokerError::Upstream { retcode: 10018, .. })
    ));
    assert_eq!(engine.store().read(|state| state.orders.len()), 0);

    let account_after = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account_after.cash_balance, dec!(10000));
}

#[tokio::test]
async fn test_likely_closed_leaves_balances_untouched() {
    let (engine, venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .execute_order(ADMIN, &account.id, seed_buy_request())
        .await
        .unwrap();

    venue.script_close(CloseResult::already_closed());
    let outcome = engine
        .close_with_venue(ADMIN, &opened.order.id, Some(dec!(1904)))
        .await
        .unwrap();

    assert!(outcome.likely_closed);
    assert!(outcome.close.is_none());
    let account_after = engine.get_account(ADMIN, &account.id).unwrap();
    assert_eq!(account_after.cash_balance, dec!(9980.975));
    let order = engine.get_order(ADMIN, &opened.order.id).unwrap();
    assert_eq!(order.order_status, OrderStatus::Processing);
}

#[test]
fn test_volume_below_minimum_is_rejected_before_any_write() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));

    let result = engine.open_trade(
        ADMIN,
        &account.id,
        OpenTradeRequest {
            volume: dec!(0.001),
            ..seed_buy_request()
        },
    );
    assert!(matches!(result, Err(BrokerError::Validation(_))));
    assert_eq!(engine.store().read(|state| state.ledger.len()), 1); // funding only
}

#[test]
fn test_cross_admin_access_is_not_found() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));
    let opened = engine
        .open_trade(ADMIN, &account.id, seed_buy_request())
        .unwrap();

    assert!(matches!(
        engine.get_order("other-admin", &opened.order.id),
        Err(BrokerError::NotFound(_))
    ));
    assert!(matches!(
        engine.close_trade("other-admin", &opened.order.id, OrderUpdate::close_at(dec!(1904))),
        Err(BrokerError::NotFound(_))
    ));
    assert!(matches!(
        engine.get_account("other-admin", &account.id),
        Err(BrokerError::NotFound(_))
    ));
}

#[test]
fn test_profile_update_changes_spreads_but_never_balances() {
    let (engine, _venue) = test_engine();
    let account = funded_account(&engine, dec!(10000));

    let updated = engine
        .update_account(
            ADMIN,
            &account.id,
            AccountUpdate {
                ask_spread: Some(dec!(1.25)),
                status: Some(AccountStatus::Suspended),
                ..AccountUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(updated.ask_spread, dec!(1.25));
    assert_eq!(updated.status, AccountStatus::Suspended);
    assert_eq!(updated.cash_balance, dec!(10000));

    assert!(matches!(
        engine.update_account("other-admin", &account.id, AccountUpdate::default()),
        Err(BrokerError::NotFound(_))
    ));
}

#[test]
fn test_duplicate_accode_per_admin_conflicts() {
    let (engine, _venue) = test_engine();
    funded_account(&engine, Decimal::ZERO);

    let duplicate = engine.create_account(
        ADMIN,
        NewAccount {
            account_head: "Someone Else".into(),
            accode: "AC001".into(),
            account_type: String::new(),
            cash_balance: Decimal::ZERO,
            metal_weight: Decimal::ZERO,
            margin: Decimal::ZERO,
            ask_spread: Decimal::ZERO,
            bid_spread: Decimal::ZERO,
            phone_number: None,
            email: None,
        },
    );
    assert!(matches!(duplicate, Err(BrokerError::Conflict(_))));
}
