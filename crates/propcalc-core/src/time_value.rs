use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::PropCalcError;
use crate::types::{Money, Rate, Years};
use crate::PropCalcResult;

/// Net Present Value of a series of cash flows, index 0 undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> PropCalcResult<Money> {
    if rate <= dec!(-1) {
        return Err(PropCalcError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let one_plus_r = Decimal::ONE + rate;
    let mut result = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        let overflow = || {
            PropCalcError::FinancialImpossibility(format!("NPV overflowed at period {t}"))
        };
        if t > 0 {
            discount = discount.checked_div(one_plus_r).ok_or_else(overflow)?;
        }
        let term = cf.checked_mul(discount).ok_or_else(overflow)?;
        result = result.checked_add(term).ok_or_else(overflow)?;
    }

    Ok(result)
}

/// `(1 + rate)^years`. Whole-year exponents use exact integer powers;
/// fractional exponents go through `powd`. Saturates instead of panicking.
pub fn growth_factor(rate: Rate, years: Years) -> Decimal {
    if rate.is_zero() || years.is_zero() {
        return Decimal::ONE;
    }
    let base = Decimal::ONE + rate;
    let factor = if years.fract().is_zero() {
        years.to_i64().and_then(|n| base.checked_powi(n))
    } else {
        base.checked_powd(years)
    };
    factor.unwrap_or(Decimal::MAX)
}

/// Convert a per-period rate into an effective annual rate.
pub fn annualize_periodic_rate(periodic_rate: Rate, periods_per_year: u32) -> Rate {
    if periods_per_year <= 1 {
        return periodic_rate;
    }
    growth_factor(periodic_rate, Decimal::from(periods_per_year)) - Decimal::ONE
}

/// Per-period rate equivalent to an effective annual rate.
pub fn periodic_rate(annual_rate: Rate, periods_per_year: u32) -> Rate {
    if periods_per_year <= 1 {
        return annual_rate;
    }
    growth_factor(annual_rate, Decimal::ONE / Decimal::from(periods_per_year)) - Decimal::ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(Decimal::ZERO, &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_rejects_total_loss_rate() {
        assert!(npv(dec!(-1), &[dec!(-100), dec!(10)]).is_err());
    }

    #[test]
    fn test_growth_factor_whole_years() {
        assert_eq!(growth_factor(dec!(0.10), dec!(2)), dec!(1.21));
        assert_eq!(growth_factor(Decimal::ZERO, dec!(7)), Decimal::ONE);
    }

    #[test]
    fn test_growth_factor_fractional_years() {
        let half = growth_factor(dec!(0.21), dec!(0.5));
        assert!((half - dec!(1.1)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_periodic_rate_inverts_annualize() {
        let monthly = periodic_rate(dec!(0.10), 12);
        let back = annualize_periodic_rate(monthly, 12);
        assert!((back - dec!(0.10)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_annualize_monthly_rate() {
        let annual = annualize_periodic_rate(dec!(0.01), 12);
        assert!((annual - dec!(0.126825)).abs() < dec!(0.000001));
    }
}
