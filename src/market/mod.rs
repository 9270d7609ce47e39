//! Cached market data with an adaptive poll loop
//!
//! A single poller task refreshes subscribed symbols whose cached tick has
//! aged past the TTL. The interval widens on errors and on inactivity, and
//! tightens when the first subscriber arrives. Reads are synchronous
//! snapshots; `get_market_data` forces a refresh only when the cache is
//! stale.

use crate::bridge::Venue;
use crate::constants::{
    FRESH_DELAYED_MS, FRESH_LIVE_MS, INACTIVE_TIMEOUT_MS, POLL_INTERVAL_MAX_MS,
    POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MS, POLL_SPACING_MS, PRICE_CACHE_TTL_MS,
};
use crate::error::BrokerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Point-in-time view of one symbol's market data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread: Decimal,
    pub last_update: DateTime<Utc>,
    /// False when the snapshot is served stale after a failed refresh
    pub is_fresh: bool,
}

impl MarketSnapshot {
    /// Age of this snapshot in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.last_update).num_milliseconds()
    }

    pub fn freshness(&self) -> Freshness {
        Freshness::from_age_ms(self.age_ms())
    }
}

/// Client-facing staleness label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    Live,
    Delayed,
    Stale,
}

impl Freshness {
    pub fn from_age_ms(age_ms: i64) -> Self {
        if age_ms < FRESH_LIVE_MS {
            Self::Live
        } else if age_ms < FRESH_DELAYED_MS {
            Self::Delayed
        } else {
            Self::Stale
        }
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::Delayed => write!(f, "Delayed"),
            Self::Stale => write!(f, "Stale"),
        }
    }
}

/// Shared market data cache and poller state
pub struct MarketDataService {
    venue: Arc<dyn Venue>,
    symbols: Mutex<HashSet<String>>,
    cache: RwLock<HashMap<String, MarketSnapshot>>,
    subscribers: Mutex<HashSet<String>>,
    last_activity: Mutex<Instant>,
    interval_ms: AtomicU64,
    is_updating: AtomicBool,
}

impl std::fmt::Debug for MarketDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataService")
            .field("interval_ms", &self.interval_ms.load(Ordering::SeqCst))
            .finish()
    }
}

impl MarketDataService {
    pub fn new(venue: Arc<dyn Venue>) -> Self {
        Self {
            venue,
            symbols: Mutex::new(HashSet::new()),
            cache: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(HashSet::new()),
            last_activity: Mutex::new(Instant::now()),
            interval_ms: AtomicU64::new(POLL_INTERVAL_MS),
            is_updating: AtomicBool::new(false),
        }
    }

    /// Add a symbol to the poll set.
    pub fn subscribe_symbol(&self, symbol: &str) {
        self.symbols
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.to_string());
    }

    /// Register an active consumer; the first one tightens the poll interval.
    pub fn add_subscriber(&self, id: &str) {
        let first = {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            let was_empty = subs.is_empty();
            subs.insert(id.to_string());
            was_empty
        };
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        if first {
            let current = self.interval_ms.load(Ordering::SeqCst);
            let tightened = ((current as f64 * 0.8) as u64).max(POLL_INTERVAL_MIN_MS);
            self.interval_ms.store(tightened, Ordering::SeqCst);
            debug!("first subscriber, poll interval now {tightened}ms");
        }
    }

    pub fn remove_subscriber(&self, id: &str) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Current poll interval in milliseconds.
    pub fn poll_interval_ms(&self) -> u64 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    fn widen_interval(&self) {
        let current = self.interval_ms.load(Ordering::SeqCst);
        let widened = ((current as f64 * 1.2) as u64).min(POLL_INTERVAL_MAX_MS);
        self.interval_ms.store(widened, Ordering::SeqCst);
    }

    fn store_snapshot(&self, snapshot: MarketSnapshot) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.symbol.clone(), snapshot);
    }

    fn cached(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .cloned()
    }

    async fn refresh(&self, symbol: &str) -> Result<MarketSnapshot, BrokerError> {
        let quote = self.venue.get_price(symbol).await?;
        let snapshot = MarketSnapshot {
            symbol: quote.symbol,
            bid: quote.bid,
            ask: quote.ask,
            spread: quote.spread,
            last_update: Utc::now(),
            is_fresh: true,
        };
        self.store_snapshot(snapshot.clone());
        Ok(snapshot)
    }

    /// Cached data for a symbol, refreshed first when stale.
    ///
    /// A failed refresh degrades to the stale snapshot with
    /// `is_fresh = false` rather than erroring, as long as a snapshot
    /// exists at all.
    pub async fn get_market_data(
        &self,
        symbol: &str,
        client_id: Option<&str>,
    ) -> Result<MarketSnapshot, BrokerError> {
        if let Some(id) = client_id {
            self.add_subscriber(id);
        }
        self.subscribe_symbol(symbol);

        if let Some(snapshot) = self.cached(symbol)
            && snapshot.age_ms() <= PRICE_CACHE_TTL_MS
        {
            return Ok(snapshot);
        }

        match self.refresh(symbol).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => match self.cached(symbol) {
                Some(mut snapshot) => {
                    warn!("refresh failed for {symbol}, serving stale data: {err}");
                    snapshot.is_fresh = false;
                    Ok(snapshot)
                }
                None => Err(err),
            },
        }
    }

    /// Refresh a symbol now regardless of cache age.
    pub async fn force_refresh(&self, symbol: &str) -> Result<MarketSnapshot, BrokerError> {
        self.subscribe_symbol(symbol);
        self.refresh(symbol).await
    }

    /// One poller tick: refresh every subscribed symbol whose cache entry
    /// has aged past the TTL. Only one tick runs at a time.
    pub async fn poll_once(&self) {
        if self.is_updating.swap(true, Ordering::SeqCst) {
            return;
        }

        let symbols: Vec<String> = {
            let set = self.symbols.lock().unwrap_or_else(|e| e.into_inner());
            set.iter().cloned().collect()
        };

        let mut failed = false;
        let mut first = true;
        for symbol in symbols {
            let stale = self
                .cached(&symbol)
                .is_none_or(|snapshot| snapshot.age_ms() > PRICE_CACHE_TTL_MS);
            if !stale {
                continue;
            }
            if !first {
                tokio::time::sleep(Duration::from_millis(POLL_SPACING_MS)).await;
            }
            first = false;
            if let Err(err) = self.refresh(&symbol).await {
                warn!("poll refresh failed for {symbol}: {err}");
                failed = true;
            }
        }

        if failed {
            self.widen_interval();
        }

        self.apply_inactivity_scaling();
        self.is_updating.store(false, Ordering::SeqCst);
    }

    fn apply_inactivity_scaling(&self) {
        let idle = self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed();
        let no_subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty();
        if no_subscribers && idle >= Duration::from_millis(INACTIVE_TIMEOUT_MS) {
            self.interval_ms
                .store(POLL_INTERVAL_MAX_MS, Ordering::SeqCst);
        }
    }

    /// Poll loop; spawn with `tokio::spawn(service.clone().run())`.
    pub async fn run(self: Arc<Self>) {
        loop {
            let interval = self.interval_ms.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(interval)).await;
            self.poll_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockVenue;
    use rust_decimal_macros::dec;

    fn service_with_price() -> (Arc<MockVenue>, MarketDataService) {
        let venue = Arc::new(MockVenue::new());
        venue.set_price("XAUUSD", dec!(1900), dec!(1902));
        let service = MarketDataService::new(venue.clone());
        (venue, service)
    }

    #[tokio::test]
    async fn test_get_market_data_populates_cache() {
        let (_venue, service) = service_with_price();
        let snapshot = service.get_market_data("XAUUSD", None).await.unwrap();
        assert_eq!(snapshot.bid, dec!(1900));
        assert_eq!(snapshot.ask, dec!(1902));
        assert!(snapshot.is_fresh);
        assert_eq!(snapshot.freshness(), Freshness::Live);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_not_refetched() {
        let (venue, service) = service_with_price();
        service.get_market_data("XAUUSD", None).await.unwrap();
        service.get_market_data("XAUUSD", None).await.unwrap();
        assert_eq!(venue.price_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_snapshot() {
        let (venue, service) = service_with_price();
        service.get_market_data("XAUUSD", None).await.unwrap();

        // Age the cached entry past the TTL, then break the feed.
        {
            let mut cache = service.cache.write().unwrap();
            let entry = cache.get_mut("XAUUSD").unwrap();
            entry.last_update = Utc::now() - chrono::Duration::seconds(60);
        }
        venue.set_fail_prices(true);

        let snapshot = service.get_market_data("XAUUSD", None).await.unwrap();
        assert!(!snapshot.is_fresh);
        assert_eq!(snapshot.bid, dec!(1900));
    }

    #[tokio::test]
    async fn test_refresh_failure_without_cache_errors() {
        let venue = Arc::new(MockVenue::new());
        venue.set_fail_prices(true);
        let service = MarketDataService::new(venue);
        assert!(service.get_market_data("XAUUSD", None).await.is_err());
    }

    #[tokio::test]
    async fn test_first_subscriber_tightens_interval() {
        let (_venue, service) = service_with_price();
        let before = service.poll_interval_ms();
        service.add_subscriber("client-1");
        assert!(service.poll_interval_ms() < before);
    }

    #[tokio::test]
    async fn test_poll_error_widens_interval() {
        let (venue, service) = service_with_price();
        service.subscribe_symbol("XAUUSD");
        venue.set_fail_prices(true);
        let before = service.poll_interval_ms();
        service.poll_once().await;
        assert!(service.poll_interval_ms() > before);
    }

    #[test]
    fn test_freshness_thresholds() {
        assert_eq!(Freshness::from_age_ms(0), Freshness::Live);
        assert_eq!(Freshness::from_age_ms(59_999), Freshness::Live);
        assert_eq!(Freshness::from_age_ms(60_000), Freshness::Delayed);
        assert_eq!(Freshness::from_age_ms(299_999), Freshness::Delayed);
        assert_eq!(Freshness::from_age_ms(300_000), Freshness::Stale);
        assert_eq!(Freshness::from_age_ms(300_000).to_string(), "Stale");
    }
}
