//! Opening a trade: the nine-write atomic unit

use crate::bridge::TradeRequest;
use crate::constants::MIN_ORDER_VOLUME;
use crate::engine::{Balances, TradingEngine};
use crate::error::BrokerError;
use crate::ledger::JournalWriter;
use crate::model::{
    EntryNature, LedgerEntry, LpDetails, LpPosition, Order, OrderDetails, OrderSide, OrderStatus,
    PositionStatus,
};
use crate::pricing::{gold_weight_value, quote_for_open};
use crate::store::ids;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::info;

/// Request to open a client position
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTradeRequest {
    /// Logical symbol, e.g. "GOLD"
    pub symbol: String,
    pub side: OrderSide,
    /// Volume in grams
    pub volume: Decimal,
    /// Side-appropriate raw spot (ask for a buy, bid for a sell)
    pub spot: Decimal,
    /// Explicit margin; derived from the quote when absent
    pub required_margin: Option<Decimal>,
    pub opening_date: Option<DateTime<Utc>>,
    /// Venue ticket when the placement already happened
    pub ticket: Option<u64>,
    pub comment: Option<String>,
}

/// Everything written by a successful open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTradeReport {
    pub order: Order,
    pub lp_position: LpPosition,
    pub balances: Balances,
    pub required_margin: Decimal,
    /// TTB AED value of the position at the raw spot
    pub gold_weight_value: Decimal,
    pub ledger_entries: Vec<LedgerEntry>,
}

impl TradingEngine {
    /// Place the order on the venue, then record it atomically.
    ///
    /// The bridge retries transient retcodes internally, so one successful
    /// placement yields exactly one recorded order.
    pub async fn execute_order(
        &self,
        admin_id: &str,
        user_id: &str,
        mut request: OpenTradeRequest,
    ) -> Result<OpenTradeReport, BrokerError> {
        let trade = self
            .venue()
            .place_trade(TradeRequest {
                symbol: self.symbol().to_string(),
                volume: request.volume,
                side: request.side,
                sl_distance: None,
                tp_distance: None,
                comment: request.comment.clone(),
                magic: None,
            })
            .await?;

        request.ticket = Some(trade.ticket);
        if request.spot <= Decimal::ZERO {
            request.spot = trade.price;
        }
        self.open_trade(admin_id, user_id, request)
    }

    /// Record an open: order, LP mirror, balance mutation and four journal
    /// lines in one store transaction.
    pub fn open_trade(
        &self,
        admin_id: &str,
        user_id: &str,
        request: OpenTradeRequest,
    ) -> Result<OpenTradeReport, BrokerError> {
        if request.volume < MIN_ORDER_VOLUME {
            return Err(BrokerError::Validation(format!(
                "volume must be at least {MIN_ORDER_VOLUME} grams"
            )));
        }
        if request.spot <= Decimal::ZERO {
            return Err(BrokerError::Validation("spot price must be positive".into()));
        }

        let seq = self.store().next_seq();
        let entry_seqs: [u64; 4] = std::array::from_fn(|_| self.store().next_seq());
        let policy = self.policy();
        let admin = admin_id.to_string();
        let user = user_id.to_string();

        self.store().transaction(move |state| {
            let account = state
                .accounts
                .get_mut(&user)
                .filter(|acc| acc.admin_owner == admin)
                .ok_or_else(|| BrokerError::NotFound(format!("account {user}")))?;

            let opening_date = request.opening_date.unwrap_or_else(Utc::now);
            let client_price =
                quote_for_open(request.spot, request.side, account.ask_spread, account.bid_spread);
            let required_margin = request
                .required_margin
                .unwrap_or_else(|| gold_weight_value(client_price, request.volume));
            let spot_weight_value = gold_weight_value(request.spot, request.volume);

            let prev_cash = account.cash_balance;
            let prev_metal = account.metal_weight;
            let new_cash = prev_cash - required_margin;
            let new_metal = match request.side {
                OrderSide::Buy => prev_metal + request.volume,
                OrderSide::Sell => prev_metal - request.volume,
            };
            if request.side == OrderSide::Sell
                && new_metal < Decimal::ZERO
                && !policy.allow_negative_metal
            {
                return Err(BrokerError::InsufficientBalance(format!(
                    "sell of {} grams exceeds metal balance {}",
                    request.volume, prev_metal
                )));
            }

            let order_no = ids::order_no(seq);
            let order = Order {
                id: ids::order_id(seq),
                order_no: order_no.clone(),
                side: request.side,
                volume: request.volume,
                symbol: request.symbol.clone(),
                price: client_price,
                opening_price: client_price,
                closing_price: None,
                required_margin,
                opening_date,
                closing_date: None,
                order_status: OrderStatus::Processing,
                profit: Decimal::ZERO,
                user: user.clone(),
                admin_id: admin.clone(),
                lp_position_id: Some(order_no.clone()),
                ticket: request.ticket,
                comment: request.comment.clone(),
                notification_error: None,
            };
            if state.orders.contains_key(&order.id) {
                return Err(BrokerError::Conflict(format!(
                    "order {} already exists",
                    order.order_no
                )));
            }

            let lp_position = LpPosition {
                position_id: order_no.clone(),
                side: request.side,
                volume: request.volume,
                symbol: request.symbol.clone(),
                entry_price: request.spot,
                current_price: request.spot,
                closing_price: None,
                open_date: opening_date,
                close_date: None,
                status: PositionStatus::Open,
                profit: Decimal::ZERO,
                client_order: order.id.clone(),
                admin_id: admin.clone(),
            };

            account.cash_balance = new_cash;
            account.metal_weight = new_metal;
            let balances = Balances {
                cash: new_cash,
                gold: new_metal,
            };

            let journal = JournalWriter::new(&user, &admin, &order_no, opening_date);
            let entries = vec![
                journal.order(
                    ids::order_entry_id(entry_seqs[0]),
                    EntryNature::Debit,
                    required_margin,
                    new_cash,
                    OrderDetails {
                        side: request.side,
                        volume: request.volume,
                        opening_price: Some(client_price),
                        closing_price: None,
                    },
                    format!("{} {} g opened at {client_price}", request.side, request.volume),
                ),
                journal.lp_position(
                    ids::lp_entry_id(entry_seqs[1]),
                    EntryNature::Credit,
                    spot_weight_value,
                    new_cash,
                    LpDetails {
                        entry_price: Some(request.spot),
                        closing_price: None,
                        profit: None,
                    },
                    format!("LP mirror opened at {}", request.spot),
                ),
                journal.transaction(
                    ids::trx_entry_id(entry_seqs[2]),
                    EntryNature::Debit,
                    crate::model::AssetKind::Cash,
                    required_margin,
                    new_cash,
                    prev_cash,
                    "Margin held",
                ),
                journal.transaction(
                    ids::trx_entry_id(entry_seqs[3]),
                    match request.side {
                        OrderSide::Buy => EntryNature::Credit,
                        OrderSide::Sell => EntryNature::Debit,
                    },
                    crate::model::AssetKind::Gold,
                    request.volume,
                    new_metal,
                    prev_metal,
                    "Metal position opened",
                ),
            ];
            state.ledger.extend(entries.iter().cloned());

            state.orders.insert(order.id.clone(), order.clone());
            state
                .lp_positions
                .insert(lp_position.position_id.clone(), lp_position.clone());

            info!(
                "order {} opened: {} {} g at {client_price}, margin {required_margin}",
                order.order_no, request.side, request.volume
            );

            Ok(OpenTradeReport {
                order,
                lp_position,
                balances,
                required_margin,
                gold_weight_value: spot_weight_value,
                ledger_entries: entries,
            })
        })
    }
}
