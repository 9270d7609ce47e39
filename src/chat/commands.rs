//! Inbound message parser
//!
//! Every message runs through this parser before state dispatch. Precedence:
//! trade short-codes, then CLOSE, then the special commands, and anything
//! else falls through to the state machine.

use crate::model::OrderSide;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Target of a `CLOSE` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseTarget {
    /// 1-based index into the session's cached open orders
    Index(usize),
    /// Explicit order number
    OrderNo(String),
}

/// A parsed inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Trade short-code: `BUY 3`, `SELL 2 TTB`, `2TTB`, bare `2`
    Quick { side: OrderSide, volume: Decimal },
    /// `BUY` or `SELL` alone; the volume is asked next
    ChooseSide(OrderSide),
    Close(CloseTarget),
    Menu,
    Reset,
    Greet,
    Balance,
    Cancel,
    Price,
    Orders,
    Refresh,
    Statement,
    /// Fell through; dispatched on the session state
    Other(String),
}

/// Menu digits claimed by special commands; a bare digit in this set is
/// never read as a buy volume.
const RESERVED_DIGITS: [&str; 3] = ["4", "5", "6"];

fn parse_volume(raw: &str) -> Option<Decimal> {
    let volume = Decimal::from_str(raw.trim()).ok()?;
    (volume > Decimal::ZERO).then_some(volume)
}

/// Parse one inbound message.
pub fn parse(input: &str) -> Command {
    let text = input.trim().to_uppercase();
    if text.is_empty() {
        return Command::Other(String::new());
    }

    // 1. Trade short-codes.
    let mut words = text.split_whitespace();
    let first = words.next().unwrap_or_default();
    if first == "BUY" || first == "SELL" {
        let side = if first == "BUY" {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let rest: String = words.collect::<Vec<_>>().join(" ");
        if rest.is_empty() {
            return Command::ChooseSide(side);
        }
        let numeric = rest.strip_suffix("TTB").unwrap_or(&rest);
        if let Some(volume) = parse_volume(numeric) {
            return Command::Quick { side, volume };
        }
    }
    if let Some(numeric) = text.strip_suffix("TTB")
        && let Some(volume) = parse_volume(numeric)
    {
        return Command::Quick {
            side: OrderSide::Buy,
            volume,
        };
    }
    if !RESERVED_DIGITS.contains(&text.as_str())
        && let Some(volume) = parse_volume(&text)
    {
        return Command::Quick {
            side: OrderSide::Buy,
            volume,
        };
    }

    // 2. CLOSE <index | order number>.
    if let Some(target) = text.strip_prefix("CLOSE ") {
        let target = target.trim();
        if let Ok(index) = target.parse::<usize>() {
            if index >= 1 {
                return Command::Close(CloseTarget::Index(index));
            }
        } else if !target.is_empty() {
            return Command::Close(CloseTarget::OrderNo(target.to_string()));
        }
    }

    // 3. Special commands.
    match text.as_str() {
        "MENU" | "HELP" => Command::Menu,
        "RESET" => Command::Reset,
        "HI" | "HELLO" | "START" => Command::Greet,
        "BALANCE" | "5" => Command::Balance,
        "CANCEL" => Command::Cancel,
        "PRICE" | "PRICES" => Command::Price,
        "ORDERS" | "POSITIONS" | "4" => Command::Orders,
        "REFRESH" => Command::Refresh,
        "STATEMENT" | "6" => Command::Statement,
        _ => Command::Other(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_sell_shortcodes() {
        assert_eq!(
            parse("buy 3"),
            Command::Quick {
                side: OrderSide::Buy,
                volume: dec!(3)
            }
        );
        assert_eq!(
            parse("SELL 2 TTB"),
            Command::Quick {
                side: OrderSide::Sell,
                volume: dec!(2)
            }
        );
        assert_eq!(
            parse("Buy 0.5ttb"),
            Command::Quick {
                side: OrderSide::Buy,
                volume: dec!(0.5)
            }
        );
    }

    #[test]
    fn test_nttb_shortcode() {
        assert_eq!(
            parse("2TTB"),
            Command::Quick {
                side: OrderSide::Buy,
                volume: dec!(2)
            }
        );
        assert_eq!(
            parse("2 ttb"),
            Command::Quick {
                side: OrderSide::Buy,
                volume: dec!(2)
            }
        );
    }

    #[test]
    fn test_bare_number_is_a_buy() {
        assert_eq!(
            parse("2"),
            Command::Quick {
                side: OrderSide::Buy,
                volume: dec!(2)
            }
        );
        assert_eq!(
            parse("0.25"),
            Command::Quick {
                side: OrderSide::Buy,
                volume: dec!(0.25)
            }
        );
    }

    #[test]
    fn test_reserved_digits_stay_special() {
        assert_eq!(parse("4"), Command::Orders);
        assert_eq!(parse("5"), Command::Balance);
        assert_eq!(parse("6"), Command::Statement);
    }

    #[test]
    fn test_close_by_index_and_order_no() {
        assert_eq!(parse("close 1"), Command::Close(CloseTarget::Index(1)));
        assert_eq!(
            parse("CLOSE ORD-000042"),
            Command::Close(CloseTarget::OrderNo("ORD-000042".into()))
        );
        assert_eq!(parse("close 0"), Command::Other("CLOSE 0".into()));
    }

    #[test]
    fn test_special_commands() {
        assert_eq!(parse("menu"), Command::Menu);
        assert_eq!(parse("HELP"), Command::Menu);
        assert_eq!(parse("hello"), Command::Greet);
        assert_eq!(parse("price"), Command::Price);
        assert_eq!(parse("positions"), Command::Orders);
        assert_eq!(parse("refresh"), Command::Refresh);
        assert_eq!(parse("reset"), Command::Reset);
        assert_eq!(parse("cancel"), Command::Cancel);
    }

    #[test]
    fn test_bare_side_asks_for_volume() {
        assert_eq!(parse("buy"), Command::ChooseSide(OrderSide::Buy));
        assert_eq!(parse("SELL"), Command::ChooseSide(OrderSide::Sell));
    }

    #[test]
    fn test_negative_and_zero_volumes_fall_through() {
        assert_eq!(parse("0"), Command::Other("0".into()));
        assert_eq!(parse("buy 0"), Command::Other("BUY 0".into()));
        assert_eq!(parse("-2"), Command::Other("-2".into()));
    }

    #[test]
    fn test_free_text_falls_through() {
        assert_eq!(parse("  what is this  "), Command::Other("WHAT IS THIS".into()));
        assert_eq!(parse("Y"), Command::Other("Y".into()));
    }
}
