//! Upstream venue bridge
//!
//! `Mt5Bridge` talks to the MT5 subprocess over line-delimited JSON. The
//! `Venue` trait is the seam the engine and market service depend on, so
//! tests substitute `MockVenue`.

pub mod client;
pub mod mock;
pub mod protocol;

pub use client::Mt5Bridge;
pub use mock::MockVenue;
pub use protocol::{
    CloseRequest, CloseResult, SymbolInfo, TickQuote, TradeRequest, TradeResult, VenuePosition,
};

use crate::constants::{MAX_RETRIES, RETRY_BACKOFF_MS};
use crate::error::BrokerError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// The upstream venue contract
#[async_trait]
pub trait Venue: Send + Sync {
    /// Establish the terminal session; idempotent.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Tear the session down.
    async fn disconnect(&self) -> Result<(), BrokerError>;

    /// Fetch the latest tick for a symbol.
    async fn get_price(&self, symbol: &str) -> Result<TickQuote, BrokerError>;

    /// Whether the cached tick for `symbol` is younger than `max_age_ms`.
    fn is_price_fresh(&self, symbol: &str, max_age_ms: i64) -> bool;

    /// Symbol metadata used for trade validation.
    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, BrokerError>;

    /// Place a market order, retrying transient retcodes internally.
    async fn place_trade(&self, request: TradeRequest) -> Result<TradeResult, BrokerError>;

    /// All live positions on the venue account.
    async fn get_positions(&self) -> Result<Vec<VenuePosition>, BrokerError>;

    /// Close a position; a ticket the venue no longer tracks is non-fatal.
    async fn close_trade(&self, request: CloseRequest) -> Result<CloseResult, BrokerError>;
}

/// Run `attempt` up to `1 + MAX_RETRIES` times, backing off between
/// transient venue failures. The attempt index is passed so callers can
/// widen the price deviation per retry.
pub(crate) async fn retry_transient<T, F, Fut>(mut attempt: F) -> Result<T, BrokerError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut tries = 0;
    loop {
        match attempt(tries).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && tries < MAX_RETRIES => {
                tries += 1;
                warn!("transient venue failure ({err}), retry {tries}/{MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::retcode;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_recovers() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(|_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(BrokerError::from_retcode(retcode::PRICE_CHANGED))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_gives_up_on_hard_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BrokerError::from_retcode(retcode::MARKET_CLOSED)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_stops_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BrokerError::from_retcode(retcode::PRICE_CHANGED)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1 + MAX_RETRIES);
    }
}
