//! Checked `Decimal` arithmetic helpers and the truncate/round rules the
//! order executor uses for quantity and price pre-rounding.
//!
//! The checked-add/checked-sub style here is the same discipline the
//! teacher's fixed-point `Position` applied to `i64` math, carried over to
//! `Decimal` instead of a custom fixed-point integer.

use crate::errors::DecimalError;
use rust_decimal::{Decimal, RoundingStrategy};

/// `a + b`, erroring instead of silently wrapping/panicking on overflow.
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, DecimalError> {
    a.checked_add(b).ok_or(DecimalError::Overflow { old: a, delta: b })
}

/// `a - b`, erroring instead of silently wrapping/panicking on overflow.
pub fn checked_sub(a: Decimal, b: Decimal) -> Result<Decimal, DecimalError> {
    a.checked_sub(b).ok_or(DecimalError::Overflow { old: a, delta: b })
}

/// `a / b`, erroring on division by zero instead of panicking.
pub fn checked_div(a: Decimal, b: Decimal) -> Result<Decimal, DecimalError> {
    if b.is_zero() {
        return Err(DecimalError::DivByZero);
    }
    a.checked_div(b).ok_or(DecimalError::Overflow { old: a, delta: b })
}

/// Requires `value > 0`, used for price/quantity inputs that must never be
/// zero or negative (an order size of zero is a bug, not a valid order).
pub fn require_positive(value: Decimal) -> Result<Decimal, DecimalError> {
    if value <= Decimal::ZERO {
        return Err(DecimalError::NotPositive { value });
    }
    Ok(value)
}

/// Quantity pre-rounding: truncate toward zero to `decimals` places.
///
/// Spec requirement: never round a sell-side quantity *up*, since that
/// could submit more than is actually held.
pub fn truncate_quantity(qty: Decimal, decimals: u32) -> Decimal {
    qty.trunc_with_scale(decimals)
}

/// Price pre-rounding: round half-to-even ("banker's rounding") to
/// `decimals` places, matching typical exchange tick-size semantics.
pub fn round_price_half_even(price: Decimal, decimals: u32) -> Decimal {
    price.round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven)
}

/// Discretizes a price onto the symbol's grid: `round(p / interval) * interval`.
///
/// `interval` must be strictly positive; callers validate this at config
/// load time (spec: `price_interval = 0` is rejected by validation).
pub fn level(price: Decimal, interval: Decimal) -> Decimal {
    debug_assert!(interval > Decimal::ZERO, "price_interval must be positive");
    (price / interval).round() * interval
}

/// Canonical string key for a grid level, stable across float/Decimal
/// representation differences. Always carries the symbol's configured
/// number of decimal places so `"100.50"` and `"100.5"` never collide.
pub fn price_key(level_price: Decimal, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, level_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn level_rounds_to_nearest_interval() {
        assert_eq!(level(dec!(100.3), dec!(1)), dec!(100));
        assert_eq!(level(dec!(100.6), dec!(1)), dec!(101));
        assert_eq!(level(dec!(101.0), dec!(0.5)), dec!(101.0));
    }

    #[test]
    fn price_key_is_stable_across_equal_values() {
        let a = price_key(dec!(100.50), 2);
        let b = price_key(dec!(100.5), 2);
        assert_eq!(a, b);
        assert_eq!(a, "100.50");
    }

    #[test]
    fn truncate_quantity_never_rounds_up() {
        assert_eq!(truncate_quantity(dec!(1.2399), 2), dec!(1.23));
        assert_eq!(truncate_quantity(dec!(-1.2399), 2), dec!(-1.23));
    }

    #[test]
    fn checked_add_overflow_is_reported() {
        let err = checked_add(Decimal::MAX, dec!(1));
        assert!(err.is_err());
    }

    #[test]
    fn require_positive_rejects_zero_and_negative() {
        assert!(require_positive(Decimal::ZERO).is_err());
        assert!(require_positive(dec!(-1)).is_err());
        assert!(require_positive(dec!(1)).is_ok());
    }
}
