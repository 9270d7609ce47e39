//! Conversational state machine
//!
//! Drives one `ChatSession` per inbound message: short-codes and special
//! commands first, then state dispatch. Quotes are taken again at
//! confirmation time so the client always trades on the latest price.

use crate::chat::commands::{self, CloseTarget, Command};
use crate::chat::format;
use crate::engine::{OpenTradeRequest, TradingEngine};
use crate::error::BrokerError;
use crate::ledger;
use crate::market::MarketDataService;
use crate::model::{
    Account, ChatSession, ChatState, OpenOrderRef, Order, OrderSide, PendingOrder,
    VenuePositionRef,
};
use crate::pricing::{gold_weight_value, quote_for_open};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, warn};

/// Logical symbol clients trade; the engine maps it to the venue symbol.
const CLIENT_SYMBOL: &str = "GOLD";

/// Reply produced by one state-machine step
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    /// Order to annotate if delivering this reply fails
    pub related_order: Option<String>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            related_order: None,
        }
    }
}

/// Stateless handler shared by all sessions
pub struct SessionHandler {
    engine: Arc<TradingEngine>,
    market: Arc<MarketDataService>,
}

impl std::fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandler").finish()
    }
}

impl SessionHandler {
    pub fn new(engine: Arc<TradingEngine>, market: Arc<MarketDataService>) -> Self {
        Self { engine, market }
    }

    /// Process one inbound message. Never fails: engine errors become
    /// client-readable text.
    pub async fn handle(&self, session: &mut ChatSession, input: &str) -> Reply {
        session.touch();
        match self.dispatch(session, input).await {
            Ok(reply) => reply,
            Err(err) => {
                error!("session {} failed on {input:?}: {err}", session.phone);
                let text = match err {
                    BrokerError::InsufficientBalance(message) => message,
                    BrokerError::Validation(message) => message,
                    _ => format::generic_error(),
                };
                Reply::text(text)
            }
        }
    }

    async fn dispatch(
        &self,
        session: &mut ChatSession,
        input: &str,
    ) -> Result<Reply, BrokerError> {
        match commands::parse(input) {
            Command::Quick { side, volume } => {
                // While a volume is awaited, a bare number keeps the side
                // the client already chose.
                let side = match (&session.state, &session.pending_order) {
                    (ChatState::AwaitingVolume, Some(pending)) => pending.side,
                    _ => side,
                };
                self.start_confirmation(session, side, volume).await
            }
            Command::ChooseSide(side) => {
                session.pending_order = Some(PendingOrder {
                    side,
                    volume: Decimal::ZERO,
                    price: Decimal::ZERO,
                    total_cost: Decimal::ZERO,
                });
                session.state = ChatState::AwaitingVolume;
                Ok(Reply::text(format::ask_volume(side)))
            }
            Command::Close(target) => self.close_order(session, target).await,
            Command::Menu => {
                session.state = ChatState::MainMenu;
                Ok(Reply::text(format::menu()))
            }
            Command::Reset => {
                session.reset();
                Ok(Reply::text(format::menu()))
            }
            Command::Greet => {
                session.state = ChatState::MainMenu;
                Ok(Reply::text(format::greeting(session.user_name.as_deref())))
            }
            Command::Balance => {
                let account = self.account(session)?;
                Ok(Reply::text(format::balance_text(&account)))
            }
            Command::Cancel => {
                session.reset();
                Ok(Reply::text(format::cancelled()))
            }
            Command::Price => {
                let snapshot = self
                    .market
                    .get_market_data(self.engine.symbol(), Some(&session.phone))
                    .await?;
                Ok(Reply::text(format::price_text(&snapshot)))
            }
            Command::Orders => self.list_orders(session).await,
            Command::Refresh => {
                let snapshot = self.market.force_refresh(self.engine.symbol()).await?;
                Ok(Reply::text(format::price_text(&snapshot)))
            }
            Command::Statement => {
                session.state = ChatState::Statement;
                let user = session.account_id.clone();
                let (summary, entries) = self
                    .engine
                    .store()
                    .read(|state| ledger::statement(state, &user, 10));
                Ok(Reply::text(format::statement_text(&summary, &entries)))
            }
            Command::Other(text) => self.dispatch_state(session, &text).await,
        }
    }

    async fn dispatch_state(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<Reply, BrokerError> {
        match session.state {
            ChatState::Start => {
                session.state = ChatState::MainMenu;
                Ok(Reply::text(format::greeting(session.user_name.as_deref())))
            }
            ChatState::MainMenu => Ok(Reply::text(format::menu())),
            ChatState::AwaitingVolume => Ok(Reply::text(format::volume_help())),
            ChatState::ConfirmOrder => match text {
                "Y" | "YES" => self.place_pending(session).await,
                "N" | "NO" => {
                    session.reset();
                    Ok(Reply::text(format::cancelled()))
                }
                _ => Ok(Reply::text(format::confirm_help())),
            },
            ChatState::Statement => {
                session.state = ChatState::MainMenu;
                Ok(Reply::text(format::menu()))
            }
        }
    }

    fn account(&self, session: &ChatSession) -> Result<Account, BrokerError> {
        self.engine
            .store()
            .read(|state| state.accounts.get(&session.account_id).cloned())
            .ok_or_else(|| BrokerError::NotFound(format!("account {}", session.account_id)))
    }

    /// Quote the requested trade and move to the confirmation step.
    async fn start_confirmation(
        &self,
        session: &mut ChatSession,
        side: OrderSide,
        volume: Decimal,
    ) -> Result<Reply, BrokerError> {
        let check = self.engine.check_sufficient_balance(&session.account_id, volume)?;
        if !check.ok {
            session.reset();
            return Ok(Reply::text(check.message));
        }

        let account = self.account(session)?;
        let snapshot = self
            .market
            .get_market_data(self.engine.symbol(), Some(&session.phone))
            .await?;
        let spot = match side {
            OrderSide::Buy => snapshot.ask,
            OrderSide::Sell => snapshot.bid,
        };
        let client_price = quote_for_open(spot, side, account.ask_spread, account.bid_spread);

        let pending = PendingOrder {
            side,
            volume,
            price: client_price,
            total_cost: gold_weight_value(client_price, volume),
        };
        session.pending_order = Some(pending.clone());
        session.state = ChatState::ConfirmOrder;

        let freshness = snapshot.freshness().to_string();
        let mut text = format::confirm_text(&pending, &freshness);
        if !snapshot.is_fresh {
            text.push_str("\n\n");
            text.push_str(&format::stale_price_warning(snapshot.age_ms() / 1000));
        }
        Ok(Reply::text(text))
    }

    /// Y received: re-quote and hand the order to the engine.
    async fn place_pending(&self, session: &mut ChatSession) -> Result<Reply, BrokerError> {
        let Some(pending) = session.pending_order.take() else {
            session.state = ChatState::MainMenu;
            return Ok(Reply::text(format::menu()));
        };

        let account = self.account(session)?;
        // Quote again at confirmation time; the shown price may have aged.
        let snapshot = self
            .market
            .get_market_data(self.engine.symbol(), Some(&session.phone))
            .await?;
        if !snapshot.is_fresh {
            warn!(
                "placing order for {} on a stale quote ({}s old)",
                session.account_id,
                snapshot.age_ms() / 1000
            );
        }
        let spot = match pending.side {
            OrderSide::Buy => snapshot.ask,
            OrderSide::Sell => snapshot.bid,
        };

        let report = self
            .engine
            .execute_order(
                &account.admin_owner,
                &account.id,
                OpenTradeRequest {
                    symbol: CLIENT_SYMBOL.to_string(),
                    side: pending.side,
                    volume: pending.volume,
                    spot,
                    required_margin: None,
                    opening_date: None,
                    ticket: None,
                    comment: Some(format!("chat {}", session.phone)),
                },
            )
            .await?;

        session.state = ChatState::MainMenu;
        self.cache_open_orders(session);

        Ok(Reply {
            text: format::order_placed(&report),
            related_order: Some(report.order.id.clone()),
        })
    }

    fn cache_open_orders(&self, session: &mut ChatSession) {
        session.open_orders = self
            .engine
            .open_orders_for_user(&session.account_id)
            .iter()
            .map(|order| OpenOrderRef {
                order_id: order.id.clone(),
                order_no: order.order_no.clone(),
                side: order.side,
                volume: order.volume,
                opening_price: order.opening_price,
            })
            .collect();
    }

    async fn list_orders(&self, session: &mut ChatSession) -> Result<Reply, BrokerError> {
        let orders: Vec<Order> = self.engine.open_orders_for_user(&session.account_id);
        self.cache_open_orders(session);

        // Venue positions are informational; a bridge hiccup must not hide
        // the client's own orders.
        match self.engine.venue().get_positions().await {
            Ok(positions) => {
                session.open_positions = positions
                    .iter()
                    .map(|position| VenuePositionRef {
                        ticket: position.ticket,
                        side: position.side,
                        volume: position.volume,
                        price_open: position.price_open,
                        profit: position.profit,
                    })
                    .collect();
            }
            Err(err) => warn!("venue positions unavailable: {err}"),
        }

        Ok(Reply::text(format::orders_text(&orders, &session.open_positions)))
    }

    async fn close_order(
        &self,
        session: &mut ChatSession,
        target: CloseTarget,
    ) -> Result<Reply, BrokerError> {
        self.cache_open_orders(session);
        let order_ref = match &target {
            CloseTarget::Index(index) => session
                .open_orders
                .get(index - 1)
                .cloned()
                .ok_or_else(|| {
                    BrokerError::Validation(format!(
                        "No open order #{index}. Send ORDERS to see the list."
                    ))
                })?,
            CloseTarget::OrderNo(order_no) => session
                .open_orders
                .iter()
                .find(|candidate| candidate.order_no.eq_ignore_ascii_case(order_no))
                .cloned()
                .ok_or_else(|| {
                    BrokerError::Validation(format!(
                        "No open order {order_no}. Send ORDERS to see the list."
                    ))
                })?,
        };

        let account = self.account(session)?;
        let snapshot = self
            .market
            .get_market_data(self.engine.symbol(), Some(&session.phone))
            .await?;
        // Closing exits on the opposite side of the book.
        let fallback_spot = match order_ref.side {
            OrderSide::Buy => snapshot.bid,
            OrderSide::Sell => snapshot.ask,
        };

        let outcome = self
            .engine
            .close_with_venue(&account.admin_owner, &order_ref.order_id, Some(fallback_spot))
            .await?;

        self.cache_open_orders(session);
        session.state = ChatState::MainMenu;

        match outcome.close {
            Some(report) => Ok(Reply {
                text: format::order_closed(&report),
                related_order: Some(report.order.id.clone()),
            }),
            None => Ok(Reply::text(format::likely_closed(&order_ref.order_no))),
        }
    }
}
