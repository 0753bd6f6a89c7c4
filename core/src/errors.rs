//! Hand-rolled error type for checked decimal arithmetic.
//!
//! Kept as a manual `Display`/`Error` impl rather than a `thiserror` derive;
//! every other error enum in this workspace derives `thiserror::Error`, this
//! one doesn't need the derive's machinery to stay small and readable.

use rust_decimal::Decimal;
use std::fmt;

/// Errors raised by the checked-arithmetic helpers in [`crate::decimal_ext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalError {
    /// A checked add/sub/mul would overflow `Decimal`'s internal representation.
    Overflow { old: Decimal, delta: Decimal },
    /// Division by zero.
    DivByZero,
    /// A quantity or price that must be strictly positive was zero or negative.
    NotPositive { value: Decimal },
}

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalError::Overflow { old, delta } => {
                write!(f, "decimal overflow: {old} + {delta} exceeds representable range")
            }
            DecimalError::DivByZero => write!(f, "division by zero"),
            DecimalError::NotPositive { value } => {
                write!(f, "expected a strictly positive value, got {value}")
            }
        }
    }
}

impl std::error::Error for DecimalError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn overflow_display_mentions_operands() {
        let err = DecimalError::Overflow {
            old: dec!(1),
            delta: dec!(2),
        };
        let msg = format!("{err}");
        assert!(msg.contains('1') && msg.contains('2'));
    }
}
