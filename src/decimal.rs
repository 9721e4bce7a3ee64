//! Decimal rounding helpers.
//!
//! All monetary quantities in this crate are `rust_decimal::Decimal`; no
//! floating point is used on a money code path. Three rounding modes are
//! needed and nowhere else in `rust_decimal` are they named this way, so we
//! wrap them here under names that match the vocabulary of the rest of the
//! crate: truncate (toward zero), half-even (banker's rounding, the default
//! for balance updates), and round-up (fees only).

use rust_decimal::{Decimal, RoundingStrategy};

/// Truncates `value` to `precision` fractional digits, toward zero.
pub fn truncate(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}

/// Rounds `value` to `precision` fractional digits, half-to-even.
pub fn round_half_even(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven)
}

/// Rounds `value` up (away from zero for positive values) to `precision`
/// fractional digits. Used exclusively for fee amounts, which must never be
/// under-charged by a rounding artifact.
pub fn round_up(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::AwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn truncate_drops_extra_digits_toward_zero() {
        assert_eq!(truncate(dec!(1.239), 2), dec!(1.23));
        assert_eq!(truncate(dec!(-1.239), 2), dec!(-1.23));
        assert_eq!(truncate(dec!(0.00000001), 0), dec!(0));
    }

    #[test]
    fn half_even_rounds_to_nearest_even_on_exact_midpoint() {
        assert_eq!(round_half_even(dec!(1.005), 2), dec!(1.00));
        assert_eq!(round_half_even(dec!(1.015), 2), dec!(1.02));
    }

    #[test]
    fn round_up_always_moves_away_from_zero() {
        assert_eq!(round_up(dec!(1.001), 2), dec!(1.01));
        assert_eq!(round_up(dec!(1.000), 2), dec!(1.00));
        assert_eq!(round_up(dec!(-1.001), 2), dec!(-1.01));
    }

    proptest! {
        #[test]
        fn truncate_is_idempotent(raw in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..9, precision in 0u32..9) {
            let value = Decimal::new(raw, scale);
            let once = truncate(value, precision);
            let twice = truncate(once, precision);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn half_even_is_idempotent(raw in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..9, precision in 0u32..9) {
            let value = Decimal::new(raw, scale);
            let once = round_half_even(value, precision);
            let twice = round_half_even(once, precision);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn round_up_never_shrinks_the_magnitude(raw in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..9, precision in 0u32..9) {
            let value = Decimal::new(raw, scale);
            let rounded = round_up(value, precision);
            prop_assert!(rounded.abs() >= value.abs());
        }

        #[test]
        fn truncate_never_exceeds_the_magnitude(raw in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..9, precision in 0u32..9) {
            let value = Decimal::new(raw, scale);
            let rounded = truncate(value, precision);
            prop_assert!(rounded.abs() <= value.abs());
        }
    }
}
