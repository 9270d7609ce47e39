//! Closing and cancelling trades: settlement and reversal

use crate::bridge::CloseRequest;
use crate::engine::{Balances, TradingEngine};
use crate::error::BrokerError;
use crate::ledger::JournalWriter;
use crate::model::{
    AssetKind, EntryNature, LedgerEntry, LpDetails, LpPosition, Order, OrderDetails, OrderSide,
    OrderStatus, OrderUpdate, PositionStatus,
};
use crate::pricing::{gold_weight_value, quote_for_close};
use crate::store::ids;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{info, warn};

/// Everything written by a close or cancel
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseTradeReport {
    pub order: Order,
    pub lp_position: LpPosition,
    pub balances: Balances,
    /// Client profit at the close quote; zero unless the order closed
    pub client_profit: Decimal,
    /// Broker profit: the spread captured on both legs
    pub lp_profit: Decimal,
    /// Cash released back to the account, set when the order closed
    pub settlement_amount: Option<Decimal>,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Outcome of a venue-backed close
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueCloseOutcome {
    /// The venue no longer tracked the ticket; balances were not touched
    pub likely_closed: bool,
    pub close: Option<CloseTradeReport>,
}

impl TradingEngine {
    /// Close the position on the venue first, then settle the client books
    /// at the venue's close price.
    ///
    /// When the venue reports the ticket as already gone, nothing is
    /// settled and `likely_closed` is surfaced to the caller.
    pub async fn close_with_venue(
        &self,
        admin_id: &str,
        order_id: &str,
        fallback_spot: Option<Decimal>,
    ) -> Result<VenueCloseOutcome, BrokerError> {
        let order = self.get_order(admin_id, order_id)?;

        let close_spot = match order.ticket {
            Some(ticket) => {
                let result = self
                    .venue()
                    .close_trade(CloseRequest {
                        ticket,
                        symbol: Some(self.symbol().to_string()),
                        volume: Some(order.volume),
                        side: Some(order.side),
                    })
                    .await?;
                if result.likely_closed {
                    warn!(
                        "venue no longer tracks ticket {ticket} for {}; books untouched",
                        order.order_no
                    );
                    return Ok(VenueCloseOutcome {
                        likely_closed: true,
                        close: None,
                    });
                }
                result.close_price.or(fallback_spot).ok_or_else(|| {
                    BrokerError::Upstream {
                        retcode: 0,
                        message: "venue close returned no price".into(),
                    }
                })?
            }
            None => fallback_spot.ok_or_else(|| {
                BrokerError::Validation(
                    "order has no venue ticket and no close price was supplied".into(),
                )
            })?,
        };

        let report = self.close_trade(admin_id, order_id, OrderUpdate::close_at(close_spot))?;
        Ok(VenueCloseOutcome {
            likely_closed: false,
            close: Some(report),
        })
    }

    /// Apply a whitelisted update to an order; a CLOSED status settles the
    /// position, a CANCELLED/FAILED status reverses the open. All writes
    /// share one store transaction.
    pub fn close_trade(
        &self,
        admin_id: &str,
        order_id: &str,
        update: OrderUpdate,
    ) -> Result<CloseTradeReport, BrokerError> {
        let mut update = update;
        if update.order_status == Some(OrderStatus::Closed) && update.closing_date.is_none() {
            update.closing_date = Some(Utc::now());
        }
        if let Some(closing_price) = update.closing_price {
            update.price = Some(closing_price);
        }

        let entry_seqs: [u64; 4] = std::array::from_fn(|_| self.store().next_seq());
        let admin = admin_id.to_string();
        let order_key = order_id.to_string();

        self.store().transaction(move |state| {
            let order_snapshot = state.order_scoped(&order_key, &admin)?.clone();

            let closing = update.order_status == Some(OrderStatus::Closed);
            let cancelling = matches!(
                update.order_status,
                Some(OrderStatus::Cancelled) | Some(OrderStatus::Failed)
            );
            if order_snapshot.order_status.is_terminal() && update.order_status.is_some() {
                return Err(BrokerError::Conflict(format!(
                    "order {} is already {:?}",
                    order_snapshot.order_no, order_snapshot.order_status
                )));
            }

            let account = state
                .accounts
                .get_mut(&order_snapshot.user)
                .ok_or_else(|| {
                    BrokerError::NotFound(format!("account {}", order_snapshot.user))
                })?;
            let (ask_spread, bid_spread) = (account.ask_spread, account.bid_spread);

            let volume = order_snapshot.volume;
            let spot = update.closing_price.unwrap_or(order_snapshot.price);
            let client_closing = quote_for_close(spot, order_snapshot.side, ask_spread, bid_spread);

            let entry_weight = gold_weight_value(order_snapshot.opening_price, volume);
            let close_spot_weight = gold_weight_value(spot, volume);
            let close_client_weight = gold_weight_value(client_closing, volume);

            let lp_snapshot = state
                .lp_positions
                .get(&order_snapshot.order_no)
                .cloned()
                .ok_or_else(|| {
                    BrokerError::Internal(format!(
                        "order {} has no LP mirror",
                        order_snapshot.order_no
                    ))
                })?;
            let lp_entry_weight = gold_weight_value(lp_snapshot.entry_price, volume);

            let client_profit = match order_snapshot.side {
                OrderSide::Buy => (client_closing - order_snapshot.opening_price) * volume,
                OrderSide::Sell => (order_snapshot.opening_price - client_closing) * volume,
            };
            // Spread captured on the opening leg plus the closing leg.
            let lp_profit = (lp_entry_weight - entry_weight).abs()
                + (close_spot_weight - close_client_weight).abs();

            let mut order = order_snapshot.clone();
            if let Some(status) = update.order_status {
                order.order_status = status;
            }
            if let Some(price) = update.price {
                order.price = price;
            }
            if let Some(closing_price) = update.closing_price {
                order.closing_price = Some(closing_price);
            }
            if let Some(closing_date) = update.closing_date {
                order.closing_date = Some(closing_date);
            }
            if let Some(comment) = update.comment.clone() {
                order.comment = Some(comment);
            }
            if let Some(profit) = update.profit
                && !closing
            {
                order.profit = profit;
            }

            let mut lp = lp_snapshot.clone();
            lp.current_price = spot;

            let mut settlement_amount = None;
            let mut entries: Vec<LedgerEntry> = Vec::new();
            let mut balances = Balances {
                cash: account.cash_balance,
                gold: account.metal_weight,
            };

            if closing {
                order.profit = client_profit.round_dp(2);

                lp.status = PositionStatus::Closed;
                lp.closing_price = Some(spot);
                lp.close_date = order.closing_date;
                lp.profit = lp_profit;

                let settlement = if order.required_margin > Decimal::ZERO {
                    order.required_margin
                } else {
                    match order.side {
                        OrderSide::Buy => close_client_weight,
                        OrderSide::Sell => entry_weight,
                    }
                };
                let user_profit = client_profit.max(Decimal::ZERO);
                let released = settlement + user_profit;
                settlement_amount = Some(settlement);

                let prev_cash = account.cash_balance;
                let prev_metal = account.metal_weight;
                let new_cash = prev_cash + released;
                let new_metal = match order.side {
                    OrderSide::Buy => prev_metal - volume,
                    OrderSide::Sell => prev_metal + volume,
                };
                account.cash_balance = new_cash;
                account.metal_weight = new_metal;
                balances = Balances {
                    cash: new_cash,
                    gold: new_metal,
                };

                let date = order.closing_date.unwrap_or_else(Utc::now);
                let journal = JournalWriter::new(&order.user, &admin, &order.order_no, date);
                entries = vec![
                    journal.order(
                        ids::order_entry_id(entry_seqs[0]),
                        EntryNature::Credit,
                        released,
                        new_cash,
                        OrderDetails {
                            side: order.side,
                            volume,
                            opening_price: Some(order.opening_price),
                            closing_price: Some(client_closing),
                        },
                        format!("{} {volume} g closed at {client_closing}", order.side),
                    ),
                    journal.lp_position(
                        ids::lp_entry_id(entry_seqs[1]),
                        EntryNature::Debit,
                        close_spot_weight,
                        new_cash,
                        LpDetails {
                            entry_price: Some(lp.entry_price),
                            closing_price: Some(spot),
                            profit: Some(lp_profit),
                        },
                        format!("LP mirror closed at {spot}"),
                    ),
                    journal.transaction(
                        ids::trx_entry_id(entry_seqs[2]),
                        EntryNature::Credit,
                        AssetKind::Cash,
                        released,
                        new_cash,
                        prev_cash,
                        "Margin released with profit",
                    ),
                    journal.transaction(
                        ids::trx_entry_id(entry_seqs[3]),
                        match order.side {
                            OrderSide::Buy => EntryNature::Debit,
                            OrderSide::Sell => EntryNature::Credit,
                        },
                        AssetKind::Gold,
                        volume,
                        new_metal,
                        prev_metal,
                        "Metal position closed",
                    ),
                ];
                state.ledger.extend(entries.iter().cloned());

                info!(
                    "order {} closed at {client_closing}: client {}, broker {}",
                    order.order_no, order.profit, lp_profit
                );
            } else if cancelling && order_snapshot.order_status == OrderStatus::Processing {
                // Reverse the open's deltas without touching profit.
                lp.status = PositionStatus::Closed;
                lp.closing_price = Some(spot);
                lp.close_date = Some(Utc::now());

                let prev_cash = account.cash_balance;
                let prev_metal = account.metal_weight;
                let new_cash = prev_cash + order.required_margin;
                let new_metal = match order.side {
                    OrderSide::Buy => prev_metal - volume,
                    OrderSide::Sell => prev_metal + volume,
                };
                account.cash_balance = new_cash;
                account.metal_weight = new_metal;
                balances = Balances {
                    cash: new_cash,
                    gold: new_metal,
                };

                let journal =
                    JournalWriter::new(&order.user, &admin, &order.order_no, Utc::now());
                entries = vec![
                    journal.order(
                        ids::order_entry_id(entry_seqs[0]),
                        EntryNature::Credit,
                        order.required_margin,
                        new_cash,
                        OrderDetails {
                            side: order.side,
                            volume,
                            opening_price: Some(order.opening_price),
                            closing_price: None,
                        },
                        format!("{} {volume} g reversed", order.side),
                    ),
                    journal.lp_position(
                        ids::lp_entry_id(entry_seqs[1]),
                        EntryNature::Debit,
                        lp_entry_weight,
                        new_cash,
                        LpDetails {
                            entry_price: Some(lp.entry_price),
                            closing_price: Some(spot),
                            profit: Some(Decimal::ZERO),
                        },
                        "LP mirror reversed",
                    ),
                    journal.transaction(
                        ids::trx_entry_id(entry_seqs[2]),
                        EntryNature::Credit,
                        AssetKind::Cash,
                        order.required_margin,
                        new_cash,
                        prev_cash,
                        "Margin returned",
                    ),
                    journal.transaction(
                        ids::trx_entry_id(entry_seqs[3]),
                        match order.side {
                            OrderSide::Buy => EntryNature::Debit,
                            OrderSide::Sell => EntryNature::Credit,
                        },
                        AssetKind::Gold,
                        volume,
                        new_metal,
                        prev_metal,
                        "Metal position reversed",
                    ),
                ];
                state.ledger.extend(entries.iter().cloned());

                info!("order {} reversed", order.order_no);
            }

            state.orders.insert(order.id.clone(), order.clone());
            state.lp_positions.insert(lp.position_id.clone(), lp.clone());

            Ok(CloseTradeReport {
                order,
                lp_position: lp,
                balances,
                client_profit: if closing { client_profit } else { Decimal::ZERO },
                lp_profit: if closing { lp_profit } else { Decimal::ZERO },
                settlement_amount,
                ledger_entries: entries,
            })
        })
    }
}
