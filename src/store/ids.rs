//! Identifier generation for stored records

use rand::Rng;
use std::collections::HashSet;

/// Client order number, `ORD-` prefixed, unique per store sequence.
pub fn order_no(seq: u64) -> String {
    format!("ORD-{seq:06}")
}

/// Storage id of an order record.
pub fn order_id(seq: u64) -> String {
    format!("odr_{seq:06}")
}

/// Journal entry id for an ORDER line.
pub fn order_entry_id(seq: u64) -> String {
    format!("ORD-E{seq:06}")
}

/// Journal entry id for an LP_POSITION line.
pub fn lp_entry_id(seq: u64) -> String {
    format!("LP-E{seq:06}")
}

/// Journal entry id for a TRANSACTION line.
pub fn trx_entry_id(seq: u64) -> String {
    format!("TRX-E{seq:06}")
}

/// Transfer record id.
pub fn transaction_id(seq: u64) -> String {
    format!("TXN-{seq:06}")
}

/// Storage id of an account record.
pub fn account_id(seq: u64) -> String {
    format!("acc_{seq:06}")
}

/// Random 5-digit reference code, retried until unique among `taken`.
pub fn ref_mid(taken: &HashSet<String>) -> String {
    let mut rng = rand::rng();
    loop {
        let candidate = format!("{}", rng.random_range(10_000..=99_999));
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_no_is_prefixed_and_padded() {
        assert_eq!(order_no(7), "ORD-000007");
    }

    #[test]
    fn test_entry_id_prefixes() {
        assert!(order_entry_id(1).starts_with("ORD-"));
        assert!(lp_entry_id(1).starts_with("LP-"));
        assert!(trx_entry_id(1).starts_with("TRX-"));
    }

    #[test]
    fn test_ref_mid_avoids_taken_codes() {
        let mut taken = HashSet::new();
        for n in 10_000..=99_999 {
            if n != 54_321 {
                taken.insert(n.to_string());
            }
        }
        assert_eq!(ref_mid(&taken), "54321");
    }
}
