//! Price derivation from spot XAU/USD to client-visible TTB prices
//!
//! All arithmetic is `Decimal`; a binary float never touches a price.

use crate::constants::{TROY_OUNCE_GRAMS, TTB_FACTOR, USD_AED_RATE};
use crate::model::OrderSide;
use rust_decimal::Decimal;

/// AED price of one Ten-Tola Bar at the given XAU/USD spot.
pub fn spot_to_ttb(spot: Decimal) -> Decimal {
    spot / TROY_OUNCE_GRAMS * USD_AED_RATE * TTB_FACTOR
}

/// Client opening quote: the account's ask spread is added on a buy,
/// the bid spread subtracted on a sell.
pub fn quote_for_open(
    spot: Decimal,
    side: OrderSide,
    ask_spread: Decimal,
    bid_spread: Decimal,
) -> Decimal {
    match side {
        OrderSide::Buy => spot + ask_spread,
        OrderSide::Sell => spot - bid_spread,
    }
}

/// Client closing quote, the opposite-side rule: closing a buy exits at
/// `spot - bid_spread`, closing a sell at `spot + ask_spread`.
pub fn quote_for_close(
    spot: Decimal,
    side: OrderSide,
    ask_spread: Decimal,
    bid_spread: Decimal,
) -> Decimal {
    match side {
        OrderSide::Buy => spot - bid_spread,
        OrderSide::Sell => spot + ask_spread,
    }
}

/// TTB AED value of `volume` bars quoted at `price`.
pub fn gold_weight_value(price: Decimal, volume: Decimal) -> Decimal {
    spot_to_ttb(price) * volume
}
