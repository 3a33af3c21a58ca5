//! Fixed-point helpers used by every ratio formula.
//!
//! Quotients are always rounded to [`SCALE`] fractional digits with banker's
//! rounding so results do not depend on the operands' own scale.

use crate::core::error::{FinanceError, Result};
use rust_decimal::{Decimal, RoundingStrategy};

pub const SCALE: u32 = 6;

pub fn divide(dividend: Decimal, divisor: Decimal) -> Result<Decimal> {
    if divisor.is_zero() {
        return Err(FinanceError::DivisionByZero);
    }
    let mut quotient = dividend
        .checked_div(divisor)
        .ok_or(FinanceError::Overflow)?
        .round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven);
    // round_dp never pads, so exact quotients need their trailing zeros back
    quotient.rescale(SCALE);
    Ok(quotient)
}

pub fn to_percent(value: Decimal) -> Result<Decimal> {
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(FinanceError::Overflow)
}

pub fn subtract(minuend: Decimal, subtrahend: Decimal) -> Result<Decimal> {
    minuend
        .checked_sub(subtrahend)
        .ok_or(FinanceError::Overflow)
}

pub fn add(augend: Decimal, addend: Decimal) -> Result<Decimal> {
    augend.checked_add(addend).ok_or(FinanceError::Overflow)
}

pub fn absolute(value: Decimal) -> Decimal {
    value.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_divide_rounds_to_fixed_scale() {
        let q = divide(dec!(1), dec!(3)).unwrap();
        assert_eq!(q.scale(), SCALE);
        assert_eq!(q, dec!(0.333333));

        // Exact quotients are padded to the same scale.
        let q = divide(dec!(10), dec!(4)).unwrap();
        assert_eq!(q.to_string(), "2.500000");
    }

    #[test]
    fn test_divide_scale_ignores_operand_scale() {
        for (a, b) in [
            (dec!(6), dec!(3)),
            (dec!(1.50), dec!(0.5)),
            (dec!(100.0000000), dec!(8)),
            (dec!(-7), dec!(2)),
        ] {
            let q = divide(a, b).unwrap();
            assert_eq!(q.scale(), SCALE, "{a} / {b} = {q}");
        }
        assert_eq!(divide(dec!(6), dec!(3)).unwrap().to_string(), "2.000000");
        assert_eq!(divide(dec!(-7), dec!(2)).unwrap().to_string(), "-3.500000");
    }

    #[test]
    fn test_divide_uses_half_even() {
        // 0.0000125 -> 0.000012, 0.0000135 -> 0.000014
        assert_eq!(divide(dec!(0.000025), dec!(2)).unwrap(), dec!(0.000012));
        assert_eq!(divide(dec!(0.000027), dec!(2)).unwrap(), dec!(0.000014));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(
            divide(dec!(5), Decimal::ZERO),
            Err(FinanceError::DivisionByZero)
        );
    }

    #[test]
    fn test_percent_and_subtract() {
        assert_eq!(to_percent(dec!(0.166667)).unwrap(), dec!(16.6667));
        assert_eq!(subtract(dec!(1000), dec!(400)).unwrap(), dec!(600));
        assert_eq!(absolute(dec!(-120)), dec!(120));
        assert_eq!(subtract(Decimal::MIN, dec!(1)), Err(FinanceError::Overflow));
    }
}
