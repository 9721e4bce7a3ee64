//! Liquidity-impact strategy: caps the base volume fillable per bar and
//! prices fills according to how much of that budget has been consumed.
//!
//! One instance lives per pair for the life of the backtest, owned by the
//! exchange and reset at the start of every bar via `on_bar`.

use crate::bar::Bar;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub trait LiquidityStrategy {
    /// Resets the per-bar budget.
    fn on_bar(&mut self, bar: &Bar);

    /// Remaining base volume fillable this bar.
    fn available_liquidity(&self) -> Decimal;

    /// Price after impact for a fill of `base_amount_signed` (sign carries
    /// BUY/SELL), given `ref_price` as the undisturbed reference price.
    fn calculate_price(&self, base_amount_signed: Decimal, ref_price: Decimal) -> Decimal;

    /// Decrements the budget by `base_amount` (unsigned).
    fn take_liquidity(&mut self, base_amount: Decimal);
}

/// Default liquidity model: the fillable budget is a fixed share of the
/// bar's volume, and price impact grows with the square of the cumulative
/// share consumed so far — monotonically worse for the side taking
/// liquidity, monotonically better (up to the reference price) for no one.
#[derive(Debug, Clone)]
pub struct VolumeShareImpact {
    max_volume_share: Decimal,
    impact_coefficient: Decimal,
    budget: Decimal,
    consumed: Decimal,
}

impl VolumeShareImpact {
    pub fn new(max_volume_share: Decimal, impact_coefficient: Decimal) -> Self {
        Self { max_volume_share, impact_coefficient, budget: Decimal::ZERO, consumed: Decimal::ZERO }
    }
}

impl Default for VolumeShareImpact {
    fn default() -> Self {
        Self::new(dec!(0.25), dec!(0.1))
    }
}

impl LiquidityStrategy for VolumeShareImpact {
    fn on_bar(&mut self, bar: &Bar) {
        self.budget = self.max_volume_share * bar.volume;
        self.consumed = Decimal::ZERO;
    }

    fn available_liquidity(&self) -> Decimal {
        (self.budget - self.consumed).max(Decimal::ZERO)
    }

    fn calculate_price(&self, base_amount_signed: Decimal, ref_price: Decimal) -> Decimal {
        if self.budget.is_zero() {
            return ref_price;
        }
        let sign = if base_amount_signed.is_sign_negative() { -Decimal::ONE } else { Decimal::ONE };
        let share = ((self.consumed + base_amount_signed.abs()) / self.budget).min(Decimal::ONE);
        ref_price * (Decimal::ONE + sign * self.impact_coefficient * share * share)
    }

    fn take_liquidity(&mut self, base_amount: Decimal) {
        self.consumed += base_amount.abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair::Pair;
    use std::time::SystemTime;

    fn bar(volume: Decimal) -> Bar {
        Bar::new(Pair::new("BTC", "USD"), SystemTime::now(), dec!(100), dec!(110), dec!(95), dec!(105), volume)
    }

    #[test]
    fn budget_is_max_share_of_volume() {
        let mut liquidity = VolumeShareImpact::new(dec!(0.25), dec!(0.1));
        liquidity.on_bar(&bar(dec!(1)));
        assert_eq!(liquidity.available_liquidity(), dec!(0.25));
    }

    #[test]
    fn take_liquidity_is_monotonically_non_increasing() {
        let mut liquidity = VolumeShareImpact::new(dec!(0.25), dec!(0.1));
        liquidity.on_bar(&bar(dec!(10)));
        let before = liquidity.available_liquidity();
        liquidity.take_liquidity(dec!(1));
        let after = liquidity.available_liquidity();
        assert!(after <= before);
        assert_eq!(before - after, dec!(1));
    }

    #[test]
    fn price_impact_is_sign_consistent() {
        let liquidity = {
            let mut l = VolumeShareImpact::new(dec!(0.25), dec!(0.1));
            l.on_bar(&bar(dec!(10)));
            l
        };
        let buy_price = liquidity.calculate_price(dec!(1), dec!(100));
        let sell_price = liquidity.calculate_price(dec!(-1), dec!(100));
        assert!(buy_price > dec!(100));
        assert!(sell_price < dec!(100));
    }

    #[test]
    fn price_impact_is_monotonic_in_consumed_share() {
        let mut liquidity = VolumeShareImpact::new(dec!(1), dec!(0.1));
        liquidity.on_bar(&bar(dec!(10)));
        let small = liquidity.calculate_price(dec!(1), dec!(100));
        liquidity.take_liquidity(dec!(5));
        let large = liquidity.calculate_price(dec!(1), dec!(100));
        assert!(large > small);
    }

    #[test]
    fn zero_volume_bar_yields_zero_budget_and_unimpacted_price() {
        let mut liquidity = VolumeShareImpact::new(dec!(0.25), dec!(0.1));
        liquidity.on_bar(&bar(dec!(0)));
        assert_eq!(liquidity.available_liquidity(), Decimal::ZERO);
        assert_eq!(liquidity.calculate_price(dec!(1), dec!(100)), dec!(100));
    }
}
