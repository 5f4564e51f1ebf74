use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropCalcError;
use crate::time_value::growth_factor;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::PropCalcResult;

/// Loan payments are always monthly, whatever the projection frequency.
pub const PAYMENTS_PER_YEAR: u32 = 12;

/// Longest loan term accepted anywhere a loan is built.
pub const MAX_TERM_YEARS: u32 = 40;

/// How a loan is serviced between origination and payoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtServiceMode {
    /// Level annuity payment; balance declines to zero at term.
    #[default]
    Amortizing,
    /// Interest on the full balance every month; principal due at term.
    InterestOnly,
}

// ---------------------------------------------------------------------------
// Closed-form formulas
// ---------------------------------------------------------------------------

fn validate_loan(principal: Money, annual_rate: Rate, term_years: u32) -> PropCalcResult<()> {
    if principal < Decimal::ZERO {
        return Err(PropCalcError::invalid(
            "principal",
            "Loan principal cannot be negative",
        ));
    }
    if annual_rate < Decimal::ZERO {
        return Err(PropCalcError::invalid(
            "annual_rate",
            "Interest rate cannot be negative",
        ));
    }
    if term_years == 0 || term_years > MAX_TERM_YEARS {
        return Err(PropCalcError::invalid(
            "term_years",
            format!("Loan term must be between 1 and {MAX_TERM_YEARS} years"),
        ));
    }
    Ok(())
}

/// Standard fixed-rate mortgage payment: P * r(1+r)^n / ((1+r)^n - 1).
///
/// `r` is the monthly rate and `n` the number of monthly payments. A zero
/// rate falls back to straight-line repayment `P / n`.
pub fn payment(principal: Money, annual_rate: Rate, term_years: u32) -> PropCalcResult<Money> {
    validate_loan(principal, annual_rate, term_years)?;

    let total_payments = term_years * PAYMENTS_PER_YEAR;
    let monthly_rate = annual_rate / Decimal::from(PAYMENTS_PER_YEAR);

    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(total_payments));
    }

    let compound = growth_factor(monthly_rate, Decimal::from(total_payments));
    if compound == Decimal::MAX {
        return Err(PropCalcError::FinancialImpossibility(format!(
            "compounding {annual_rate} over {term_years} years overflows"
        )));
    }

    Ok(principal * monthly_rate * compound / (compound - Decimal::ONE))
}

/// Outstanding balance after `periods_elapsed` monthly payments.
///
/// Consistent with [`payment`]: zero elapsed payments returns the principal
/// and a fully elapsed term returns zero.
pub fn remaining_balance(
    principal: Money,
    annual_rate: Rate,
    term_years: u32,
    periods_elapsed: u32,
) -> PropCalcResult<Money> {
    let monthly_payment = payment(principal, annual_rate, term_years)?;
    let total_payments = term_years * PAYMENTS_PER_YEAR;
    if periods_elapsed > total_payments {
        return Err(PropCalcError::invalid(
            "periods_elapsed",
            format!("{periods_elapsed} exceeds the {total_payments} scheduled payments"),
        ));
    }

    Ok(closed_form_balance(
        principal,
        annual_rate,
        total_payments,
        periods_elapsed,
        monthly_payment,
    ))
}

fn closed_form_balance(
    principal: Money,
    annual_rate: Rate,
    total_payments: u32,
    elapsed: u32,
    monthly_payment: Money,
) -> Money {
    if elapsed == 0 {
        return principal;
    }
    if elapsed >= total_payments {
        return Decimal::ZERO;
    }

    let monthly_rate = annual_rate / Decimal::from(PAYMENTS_PER_YEAR);
    let balance = if monthly_rate.is_zero() {
        principal - principal * Decimal::from(elapsed) / Decimal::from(total_payments)
    } else {
        let growth = growth_factor(monthly_rate, Decimal::from(elapsed));
        principal * growth - monthly_payment * (growth - Decimal::ONE) / monthly_rate
    };

    balance.max(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// LoanState
// ---------------------------------------------------------------------------

/// One active financing. A refinance replaces it with a fresh state whose
/// `payments_made` starts again at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanState {
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_years: u32,
    pub payments_made: u32,
    pub mode: DebtServiceMode,
    monthly_payment: Money,
}

impl LoanState {
    pub fn new(
        principal: Money,
        annual_rate: Rate,
        term_years: u32,
        mode: DebtServiceMode,
    ) -> PropCalcResult<Self> {
        let monthly_payment = match mode {
            DebtServiceMode::Amortizing => payment(principal, annual_rate, term_years)?,
            DebtServiceMode::InterestOnly => {
                validate_loan(principal, annual_rate, term_years)?;
                principal * annual_rate / Decimal::from(PAYMENTS_PER_YEAR)
            }
        };

        Ok(LoanState {
            principal,
            annual_rate,
            term_years,
            payments_made: 0,
            mode,
            monthly_payment,
        })
    }

    pub fn total_payments(&self) -> u32 {
        self.term_years * PAYMENTS_PER_YEAR
    }

    pub fn remaining_payments(&self) -> u32 {
        self.total_payments().saturating_sub(self.payments_made)
    }

    /// Scheduled monthly payment (interest only in `InterestOnly` mode).
    pub fn monthly_payment(&self) -> Money {
        self.monthly_payment
    }

    pub fn balance(&self) -> Money {
        match self.mode {
            DebtServiceMode::Amortizing => closed_form_balance(
                self.principal,
                self.annual_rate,
                self.total_payments(),
                self.payments_made,
                self.monthly_payment,
            ),
            DebtServiceMode::InterestOnly => {
                if self.payments_made >= self.total_payments() {
                    Decimal::ZERO
                } else {
                    self.principal
                }
            }
        }
    }

    pub fn is_paid_off(&self) -> bool {
        self.remaining_payments() == 0
    }

    /// Cash paid over the next `months` payments. Stops at the end of the
    /// term; an interest-only loan pays its balloon with the final payment.
    pub fn debt_service(&self, months: u32) -> Money {
        let due = months.min(self.remaining_payments());
        let mut total = self.monthly_payment * Decimal::from(due);
        if self.mode == DebtServiceMode::InterestOnly
            && due > 0
            && self.payments_made + due >= self.total_payments()
        {
            total += self.principal;
        }
        total
    }

    /// Record `months` payments as made.
    pub fn advance(&mut self, months: u32) {
        self.payments_made = (self.payments_made + months).min(self.total_payments());
    }
}

// ---------------------------------------------------------------------------
// Amortization schedule
// ---------------------------------------------------------------------------

/// Input for a month-by-month amortization table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_years: u32,
}

/// A single month in the amortization table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    pub period: u32,
    pub opening_balance: Money,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
    pub periods: Vec<AmortizationPeriod>,
    pub total_interest: Money,
    pub total_paid: Money,
}

/// Build the full monthly schedule for a fixed-rate amortizing loan.
///
/// The final payment absorbs any rounding residue so the closing balance
/// lands on exactly zero.
pub fn amortization_schedule(
    input: &AmortizationInput,
) -> PropCalcResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let monthly_payment = payment(input.principal, input.annual_rate, input.term_years)?;
    let monthly_rate = input.annual_rate / Decimal::from(PAYMENTS_PER_YEAR);
    let total_payments = input.term_years * PAYMENTS_PER_YEAR;

    if input.annual_rate > Decimal::new(25, 2) {
        warnings.push(format!(
            "Interest rate {} is above the 25% ceiling of typical lending",
            input.annual_rate
        ));
    }

    let mut periods = Vec::with_capacity(total_payments as usize);
    let mut balance = input.principal;
    let mut total_interest = Decimal::ZERO;
    let mut total_paid = Decimal::ZERO;

    for period in 1..=total_payments {
        let opening = balance;
        let interest = opening * monthly_rate;
        let mut principal_part = monthly_payment - interest;
        if period == total_payments || principal_part > opening {
            principal_part = opening;
        }
        let paid = interest + principal_part;
        balance = opening - principal_part;

        total_interest += interest;
        total_paid += paid;

        periods.push(AmortizationPeriod {
            period,
            opening_balance: opening,
            payment: paid,
            interest,
            principal: principal_part,
            closing_balance: balance,
        });
    }

    let output = AmortizationSchedule {
        monthly_payment,
        annual_debt_service: monthly_payment * Decimal::from(PAYMENTS_PER_YEAR),
        periods,
        total_interest,
        total_paid,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fixed-Rate Loan Amortization (monthly)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_matches_annuity_formula() {
        let pmt = payment(dec!(210000), dec!(0.095), 30).unwrap();
        assert!((pmt - dec!(1765.79)).abs() < dec!(0.01), "got {pmt}");
    }

    #[test]
    fn test_zero_rate_is_linear() {
        let pmt = payment(dec!(120000), Decimal::ZERO, 10).unwrap();
        assert_eq!(pmt, dec!(1000));
        let bal = remaining_balance(dec!(120000), Decimal::ZERO, 10, 60).unwrap();
        assert_eq!(bal, dec!(60000));
    }

    #[test]
    fn test_balance_endpoints() {
        for (p, r, t) in [
            (dec!(100000), dec!(0.05), 30u32),
            (dec!(350000), dec!(0.30), 1),
            (dec!(1), dec!(0.0001), 40),
        ] {
            assert_eq!(remaining_balance(p, r, t, 0).unwrap(), p);
            let end = remaining_balance(p, r, t, t * 12).unwrap();
            assert!(end.abs() <= dec!(1));
        }
    }

    #[test]
    fn test_balance_after_five_years() {
        let bal = remaining_balance(dec!(200000), dec!(0.06), 30, 60).unwrap();
        assert!((bal - dec!(186108.71)).abs() < dec!(0.05), "got {bal}");
    }

    #[test]
    fn test_contract_violations() {
        assert!(payment(dec!(100), dec!(-0.01), 30).is_err());
        assert!(payment(dec!(100), dec!(0.05), 0).is_err());
        assert!(payment(dec!(100), dec!(0.05), MAX_TERM_YEARS + 1).is_err());
        assert!(payment(dec!(100), dec!(0.05), MAX_TERM_YEARS).is_ok());
        assert!(remaining_balance(dec!(100), dec!(0.05), 1, 13).is_err());
    }

    #[test]
    fn test_loan_state_advance_and_service() {
        let mut loan = LoanState::new(dec!(120000), Decimal::ZERO, 1, DebtServiceMode::Amortizing)
            .unwrap();
        assert_eq!(loan.debt_service(12), dec!(120000));
        loan.advance(6);
        assert_eq!(loan.balance(), dec!(60000));
        assert_eq!(loan.debt_service(12), dec!(60000));
        loan.advance(24);
        assert!(loan.is_paid_off());
        assert_eq!(loan.balance(), Decimal::ZERO);
    }

    #[test]
    fn test_interest_only_balance_flat() {
        let mut loan =
            LoanState::new(dec!(100000), dec!(0.12), 2, DebtServiceMode::InterestOnly).unwrap();
        assert_eq!(loan.monthly_payment(), dec!(1000));
        loan.advance(12);
        assert_eq!(loan.balance(), dec!(100000));
        // Year 2 carries the balloon.
        assert_eq!(loan.debt_service(12), dec!(112000));
    }

    #[test]
    fn test_schedule_closes_at_zero() {
        let input = AmortizationInput {
            principal: dec!(250000),
            annual_rate: dec!(0.07),
            term_years: 15,
        };
        let out = amortization_schedule(&input).unwrap().result;
        assert_eq!(out.periods.len(), 180);
        assert_eq!(out.periods.last().unwrap().closing_balance, Decimal::ZERO);
        assert!((out.total_paid - out.total_interest - dec!(250000)).abs() < dec!(0.0001));
        for w in out.periods.windows(2) {
            assert!(w[1].closing_balance <= w[0].closing_balance);
        }
    }
}
