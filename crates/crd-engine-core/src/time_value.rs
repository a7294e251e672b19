use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::CrdEngineError;
use crate::types::{Money, Rate};
use crate::CrdEngineResult;

/// Smallest currency unit; residual capital below this is treated as repaid.
pub const CURRENCY_TOLERANCE: Money = dec!(0.01);

const MONTHS_PER_YEAR: Decimal = dec!(12);
const PERCENT: Decimal = dec!(100);

/// Round a monetary amount to cents, half away from zero.
///
/// Every amount stored in a schedule row goes through this function, and the
/// rounded remaining capital is what the next month's interest is computed on.
pub fn round_currency(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an annual percentage (3.5 = 3.5%) into a monthly decimal rate.
pub fn monthly_rate_from_annual_pct(annual_pct: Decimal) -> Rate {
    annual_pct / PERCENT / MONTHS_PER_YEAR
}

/// Steady-state principal + interest payment of a fixed annuity.
///
/// `principal * r * (1+r)^n / ((1+r)^n - 1)`, or straight-line `principal / n`
/// when the rate is zero. Unrounded; callers round once at the row level.
pub fn steady_payment(principal: Money, monthly_rate: Rate, months: u32) -> CrdEngineResult<Money> {
    if months == 0 {
        return Err(CrdEngineError::InvalidLoanParameters {
            field: "duration_months".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(months));
    }

    let factor = compound_factor(monthly_rate, months)?;
    let denominator = factor - Decimal::ONE;
    if denominator.is_zero() {
        return Err(CrdEngineError::ArithmeticOverflow {
            context: "annuity factor collapsed to zero".into(),
        });
    }

    principal
        .checked_mul(monthly_rate)
        .and_then(|v| v.checked_mul(factor))
        .and_then(|v| v.checked_div(denominator))
        .ok_or_else(|| CrdEngineError::ArithmeticOverflow {
            context: "annuity payment".into(),
        })
}

/// `a * b`, or `ArithmeticOverflow` naming `context` when the product leaves
/// the Decimal range.
pub fn checked_product(a: Decimal, b: Decimal, context: &str) -> CrdEngineResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| CrdEngineError::ArithmeticOverflow {
        context: context.into(),
    })
}

/// `a + b`, or `ArithmeticOverflow` naming `context`.
pub fn checked_total(a: Decimal, b: Decimal, context: &str) -> CrdEngineResult<Decimal> {
    a.checked_add(b).ok_or_else(|| CrdEngineError::ArithmeticOverflow {
        context: context.into(),
    })
}

/// `(1 + rate)^n` via iterative multiplication, failing instead of panicking
/// when the product leaves the Decimal range.
fn compound_factor(rate: Rate, n: u32) -> CrdEngineResult<Decimal> {
    let base = Decimal::ONE + rate;
    let mut result = Decimal::ONE;
    for _ in 0..n {
        result = result
            .checked_mul(base)
            .ok_or_else(|| CrdEngineError::ArithmeticOverflow {
                context: format!("compounding {rate} over {n} periods"),
            })?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency_half_away_from_zero() {
        assert_eq!(round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(round_currency(dec!(1.004999)), dec!(1.00));
        assert_eq!(round_currency(dec!(2.345)), dec!(2.35));
        assert_eq!(round_currency(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn test_checked_helpers_report_overflow() {
        assert_eq!(checked_product(dec!(2), dec!(3.5), "x").unwrap(), dec!(7));
        let err = checked_product(Decimal::MAX, dec!(2), "insurance").unwrap_err();
        assert!(matches!(err, CrdEngineError::ArithmeticOverflow { ref context } if context == "insurance"));
        assert!(checked_total(Decimal::MAX, Decimal::ONE, "totals").is_err());
    }

    #[test]
    fn test_monthly_rate_from_annual_pct() {
        assert_eq!(monthly_rate_from_annual_pct(dec!(3)), dec!(0.0025));
        assert_eq!(monthly_rate_from_annual_pct(dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn test_steady_payment_known_annuity() {
        // 200k at 3% over 20 years: 1109.1952...
        let pmt = steady_payment(dec!(200000), dec!(0.0025), 240).unwrap();
        assert!((pmt - dec!(1109.1952)).abs() < dec!(0.001), "got {pmt}");
        assert_eq!(round_currency(pmt), dec!(1109.20));
    }

    #[test]
    fn test_steady_payment_zero_rate_is_straight_line() {
        let pmt = steady_payment(dec!(12000), Decimal::ZERO, 24).unwrap();
        assert_eq!(pmt, dec!(500));
    }

    #[test]
    fn test_steady_payment_single_period() {
        let pmt = steady_payment(dec!(1000), dec!(0.01), 1).unwrap();
        assert_eq!(round_currency(pmt), dec!(1010.00));
    }

    #[test]
    fn test_steady_payment_zero_periods_rejected() {
        assert!(steady_payment(dec!(1000), dec!(0.01), 0).is_err());
    }

    #[test]
    fn test_steady_payment_overflow_is_an_error() {
        let err = steady_payment(dec!(1000), dec!(5), 1200).unwrap_err();
        assert!(matches!(err, CrdEngineError::ArithmeticOverflow { .. }));
    }
}
