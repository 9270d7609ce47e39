//! Brokerage engine constants

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Grams per troy ounce, used to convert XAU/USD quotes to per-gram prices
pub const TROY_OUNCE_GRAMS: Decimal = dec!(31.103);

/// USD to AED conversion rate applied to derived prices
pub const USD_AED_RATE: Decimal = dec!(3.674);

/// Weight of one Ten-Tola Bar in grams
pub const TTB_FACTOR: Decimal = dec!(116.64);

/// Default timeout for bridge requests in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Timeout for trade placement and close requests in seconds
pub const TRADE_TIMEOUT: u64 = 45;

/// Maximum number of retries for transient venue retcodes
pub const MAX_RETRIES: u32 = 3;

/// Back-off between venue retries in milliseconds
pub const RETRY_BACKOFF_MS: u64 = 1_000;

/// Extra price deviation (points) added on each venue retry
pub const RETRY_DEVIATION_STEP: u32 = 10;

/// Maximum comment length accepted by the venue
pub const MAX_COMMENT_LEN: usize = 26;

/// Cached quote lifetime in milliseconds
pub const PRICE_CACHE_TTL_MS: i64 = 15_000;

/// Default market-data poll interval in milliseconds
pub const POLL_INTERVAL_MS: u64 = 10_000;

/// Lower bound for the adaptive poll interval in milliseconds
pub const POLL_INTERVAL_MIN_MS: u64 = 5_000;

/// Upper bound for the adaptive poll interval in milliseconds
pub const POLL_INTERVAL_MAX_MS: u64 = 30_000;

/// Spacing between per-symbol refreshes inside one poll tick
pub const POLL_SPACING_MS: u64 = 50;

/// Idle period after which the poller scales down, in milliseconds
pub const INACTIVE_TIMEOUT_MS: u64 = 300_000;

/// Quote age below which a price is labelled live, in milliseconds
pub const FRESH_LIVE_MS: i64 = 60_000;

/// Quote age below which a price is labelled delayed, in milliseconds
pub const FRESH_DELAYED_MS: i64 = 300_000;

/// How long a processed webhook message id is remembered, in seconds
pub const DEDUP_TTL_SECS: u64 = 300;

/// Inactive chat sessions are evicted after this many seconds
pub const SESSION_TTL_SECS: u64 = 1_800;

/// Minimum tradable volume in grams
pub const MIN_ORDER_VOLUME: Decimal = dec!(0.01);

/// Venue retcodes
pub mod retcode {
    /// Request completed
    pub const DONE: u32 = 10009;
    /// Requote
    pub const REQUOTE: u32 = 10013;
    /// Invalid request parameters
    pub const INVALID_PARAMS: u32 = 10017;
    /// Market closed
    pub const MARKET_CLOSED: u32 = 10018;
    /// Insufficient funds on the venue account
    pub const NO_MONEY: u32 = 10019;
    /// Prices changed while processing
    pub const PRICE_CHANGED: u32 = 10020;
    /// Invalid request
    pub const INVALID_REQUEST: u32 = 10021;
    /// Invalid stop-loss or take-profit
    pub const INVALID_STOPS: u32 = 10022;
    /// Autotrading disabled on the terminal
    pub const AUTOTRADING_DISABLED: u32 = 10027;
}
