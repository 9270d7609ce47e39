//! Client-facing message rendering
//!
//! Timestamps are stored UTC and rendered in Gulf time here.

use crate::engine::{CloseTradeReport, OpenTradeReport};
use crate::ledger::StatementSummary;
use crate::market::MarketSnapshot;
use crate::model::{Account, LedgerEntry, Order, OrderSide, PendingOrder, VenuePositionRef};
use crate::pricing::spot_to_ttb;
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Dubai;

/// Render a UTC timestamp in Gulf time for client messages.
pub fn fmt_dubai(time: DateTime<Utc>) -> String {
    time.with_timezone(&Dubai).format("%d-%m-%Y %H:%M").to_string()
}

pub fn access_denied() -> String {
    "Access Denied. This number is not registered for trading. Please contact your broker."
        .to_string()
}

pub fn generic_error() -> String {
    "Sorry, something went wrong while processing your request. Please try again or send MENU."
        .to_string()
}

pub fn greeting(name: Option<&str>) -> String {
    let who = name.map(|n| format!(" {n}")).unwrap_or_default();
    format!("Welcome{who}!\n\n{}", menu())
}

pub fn menu() -> String {
    [
        "Gold Trading Menu",
        "1. BUY <volume>  (e.g. BUY 1 or 2TTB)",
        "2. SELL <volume> (e.g. SELL 1)",
        "3. PRICE  - live TTB price",
        "4. ORDERS - open orders and positions",
        "5. BALANCE",
        "6. STATEMENT",
        "",
        "CLOSE <n> closes an open order. RESET starts over.",
    ]
    .join("\n")
}

pub fn balance_text(account: &Account) -> String {
    format!(
        "Account {}\nCash: {} AED\nGold: {} g",
        account.ref_mid,
        account.cash_balance.round_dp(2),
        account.metal_weight.round_dp(2)
    )
}

pub fn price_text(snapshot: &MarketSnapshot) -> String {
    format!(
        "TTB price ({})\nBuy:  {} AED\nSell: {} AED\nAs of {}",
        snapshot.freshness(),
        spot_to_ttb(snapshot.ask).round_dp(2),
        spot_to_ttb(snapshot.bid).round_dp(2),
        fmt_dubai(snapshot.last_update)
    )
}

pub fn ask_volume(side: OrderSide) -> String {
    format!("How many TTB would you like to {side}? Reply with a number, or CANCEL.")
}

pub fn confirm_text(pending: &PendingOrder, freshness: &str) -> String {
    format!(
        "Confirm {} {} TTB at {} ({freshness})\nTotal: {} AED\n\nReply Y to confirm or N to cancel.",
        pending.side,
        pending.volume,
        pending.price.round_dp(2),
        pending.total_cost.round_dp(2)
    )
}

pub fn order_placed(report: &OpenTradeReport) -> String {
    format!(
        "Order {} placed: {} {} g at {}\nMargin held: {} AED\nCash: {} AED | Gold: {} g",
        report.order.order_no,
        report.order.side,
        report.order.volume,
        report.order.opening_price.round_dp(2),
        report.required_margin.round_dp(2),
        report.balances.cash.round_dp(2),
        report.balances.gold.round_dp(2)
    )
}

pub fn order_closed(report: &CloseTradeReport) -> String {
    format!(
        "Order {} closed at {}\nProfit: {} AED\nCash: {} AED | Gold: {} g",
        report.order.order_no,
        report
            .order
            .closing_price
            .unwrap_or(report.order.price)
            .round_dp(2),
        report.order.profit,
        report.balances.cash.round_dp(2),
        report.balances.gold.round_dp(2)
    )
}

pub fn likely_closed(order_no: &str) -> String {
    format!(
        "Order {order_no} appears to be already closed on the market. Your balances were not \
         changed; please contact your broker if this looks wrong."
    )
}

pub fn orders_text(orders: &[Order], positions: &[VenuePositionRef]) -> String {
    if orders.is_empty() {
        return "You have no open orders. Send BUY <volume> or SELL <volume> to trade.".to_string();
    }
    let mut lines = vec!["Your open orders:".to_string()];
    for (index, order) in orders.iter().enumerate() {
        lines.push(format!(
            "{}. {} {} {} g at {} ({})",
            index + 1,
            order.order_no,
            order.side,
            order.volume,
            order.opening_price.round_dp(2),
            fmt_dubai(order.opening_date)
        ));
    }
    if !positions.is_empty() {
        lines.push("\nMarket positions:".to_string());
        for position in positions {
            lines.push(format!(
                "#{} {} {} at {} (P/L {})",
                position.ticket,
                position.side,
                position.volume,
                position.price_open,
                position.profit.round_dp(2)
            ));
        }
    }
    lines.push("\nSend CLOSE <n> to close one.".to_string());
    lines.join("\n")
}

pub fn statement_text(summary: &StatementSummary, entries: &[LedgerEntry]) -> String {
    let mut lines = vec![format!(
        "Statement - cash {} AED, gold {} g, {} entries",
        summary.cash_total.round_dp(2),
        summary.gold_total.round_dp(2),
        summary.entry_count
    )];
    for entry in entries {
        lines.push(format!(
            "{} {:?} {:?} {} (balance {}) {}",
            fmt_dubai(entry.date),
            entry.entry_type,
            entry.entry_nature,
            entry.amount.round_dp(2),
            entry.running_balance.round_dp(2),
            entry.description
        ));
    }
    lines.push("\nSend MENU to go back.".to_string());
    lines.join("\n")
}

pub fn volume_help() -> String {
    "Please reply with a volume like 1, 2.5 or CANCEL to stop.".to_string()
}

pub fn confirm_help() -> String {
    "Please reply Y to confirm the order or N to cancel.".to_string()
}

pub fn cancelled() -> String {
    "Order cancelled. Send MENU to see your options.".to_string()
}

/// Shown when a quote is too old to trade on.
pub fn stale_price_warning(age_secs: i64) -> String {
    format!(
        "The market price is {age_secs}s old and may be stale. Send REFRESH for a fresh quote."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fmt_dubai_shifts_from_utc() {
        // Dubai is UTC+4 year-round.
        let utc = DateTime::parse_from_rfc3339("2025-03-01T20:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(fmt_dubai(utc), "02-03-2025 00:30");
    }

    #[test]
    fn test_confirm_text_mentions_total() {
        let pending = PendingOrder {
            side: OrderSide::Buy,
            volume: dec!(1),
            price: dec!(1902.5),
            total_cost: dec!(26208.44),
        };
        let text = confirm_text(&pending, "Live");
        assert!(text.contains("BUY 1 TTB"));
        assert!(text.contains("26208.44"));
        assert!(text.contains("Live"));
    }
}
