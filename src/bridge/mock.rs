//! Scriptable in-process venue used by tests

use crate::bridge::protocol::{
    CloseRequest, CloseResult, SymbolInfo, TickQuote, TradeRequest, TradeResult, VenuePosition,
};
use crate::bridge::{Venue, retry_transient};
use crate::constants::retcode;
use crate::error::BrokerError;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A venue whose responses are scripted in advance.
///
/// `place_trade` runs the same transient-retry loop as the real bridge, so
/// tests can script retcode sequences like 10020, 10020, 10009.
#[derive(Debug, Default)]
pub struct MockVenue {
    prices: Mutex<HashMap<String, TickQuote>>,
    place_script: Mutex<VecDeque<u32>>,
    positions: Mutex<Vec<VenuePosition>>,
    close_script: Mutex<VecDeque<CloseResult>>,
    placed: Mutex<Vec<TradeRequest>>,
    closed: Mutex<Vec<CloseRequest>>,
    fail_prices: AtomicBool,
    next_ticket: AtomicU64,
    price_calls: AtomicU64,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the current tick for a symbol.
    pub fn set_price(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        let quote = TickQuote {
            symbol: symbol.to_string(),
            bid,
            ask,
            spread: ask - bid,
            time: Utc::now(),
        };
        self.prices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.to_string(), quote);
    }

    /// Script the retcodes returned by successive placement attempts.
    /// An empty script means every attempt succeeds.
    pub fn script_place_retcodes(&self, codes: impl IntoIterator<Item = u32>) {
        let mut script = self.place_script.lock().unwrap_or_else(|e| e.into_inner());
        script.extend(codes);
    }

    /// Script the next close outcome.
    pub fn script_close(&self, result: CloseResult) {
        self.close_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
    }

    pub fn set_positions(&self, positions: Vec<VenuePosition>) {
        *self.positions.lock().unwrap_or_else(|e| e.into_inner()) = positions;
    }

    /// Make `get_price` fail until cleared, for staleness paths.
    pub fn set_fail_prices(&self, fail: bool) {
        self.fail_prices.store(fail, Ordering::SeqCst);
    }

    /// Trade requests the engine actually sent.
    pub fn placed(&self) -> Vec<TradeRequest> {
        self.placed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Close requests the engine actually sent.
    pub fn closed(&self) -> Vec<CloseRequest> {
        self.closed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `get_price` calls served so far.
    pub fn price_calls(&self) -> u64 {
        self.price_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Venue for MockVenue {
    async fn connect(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn get_price(&self, symbol: &str) -> Result<TickQuote, BrokerError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_prices.load(Ordering::SeqCst) {
            return Err(BrokerError::Upstream {
                retcode: 0,
                message: "price feed unavailable".into(),
            });
        }
        self.prices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(format!("symbol {symbol}")))
    }

    fn is_price_fresh(&self, symbol: &str, _max_age_ms: i64) -> bool {
        self.prices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(symbol)
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, BrokerError> {
        Ok(SymbolInfo {
            name: symbol.to_string(),
            trade_mode: 4,
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            volume_step: dec!(0.01),
            stops_level: 0,
            point: dec!(0.01),
            digits: 2,
        })
    }

    async fn place_trade(&self, request: TradeRequest) -> Result<TradeResult, BrokerError> {
        self.placed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        retry_transient(|_| {
            let code = self
                .place_script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or(retcode::DONE);
            let price = self
                .prices
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&request.symbol)
                .map(|q| q.ask)
                .unwrap_or(Decimal::ZERO);
            let volume = request.volume;
            async move {
                if code == retcode::DONE {
                    let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(TradeResult {
                        ticket,
                        deal: Some(ticket),
                        price,
                        volume,
                        sl: None,
                        tp: None,
                        retcode: code,
                    })
                } else {
                    Err(BrokerError::from_retcode(code))
                }
            }
        })
        .await
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, BrokerError> {
        Ok(self
            .positions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn close_trade(&self, request: CloseRequest) -> Result<CloseResult, BrokerError> {
        self.closed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let scripted = self
            .close_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(result) => Ok(result),
            None => {
                let bid = self
                    .prices
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .values()
                    .next()
                    .map(|q| q.bid)
                    .unwrap_or(Decimal::ZERO);
                Ok(CloseResult {
                    success: true,
                    close_price: Some(bid),
                    profit: Some(Decimal::ZERO),
                    likely_closed: false,
                    data: None,
                })
            }
        }
    }
}
