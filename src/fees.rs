//! Fee strategy: maps a fill's balance updates to per-symbol fee amounts.
//!
//! Fees returned here are unrounded; the matching engine rounds up to the
//! relevant precision (base or quote) and drops zero entries, per the
//! rounding policy shared with the rest of the fill pipeline.

use crate::orders::Order;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub trait FeeStrategy {
    fn calculate_fees(&self, order: &Order, balance_updates: &HashMap<String, Decimal>) -> HashMap<String, Decimal>;
}

/// No fees at all.
pub struct NoFee;

impl FeeStrategy for NoFee {
    fn calculate_fees(&self, _order: &Order, _balance_updates: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        HashMap::new()
    }
}

/// Charges `rate` of the amount paid on each fill. By default only the
/// negative side (what the trader pays — quote for BUY, base for SELL) is
/// charged; `both_sides` charges every symbol in the fill instead.
pub struct Percentage {
    pub rate: Decimal,
    pub both_sides: bool,
}

impl Percentage {
    pub fn new(rate: Decimal) -> Self {
        Self { rate, both_sides: false }
    }

    pub fn both_sides(rate: Decimal) -> Self {
        Self { rate, both_sides: true }
    }
}

impl FeeStrategy for Percentage {
    fn calculate_fees(&self, _order: &Order, balance_updates: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        let mut fees = HashMap::new();
        for (symbol, amount) in balance_updates {
            if !self.both_sides && *amount >= Decimal::ZERO {
                continue;
            }
            let fee = amount.abs() * self.rate;
            if !fee.is_zero() {
                fees.insert(symbol.clone(), fee);
            }
        }
        fees
    }
}
