use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

pub const INITIAL_GUESS: Rate = dec!(0.10);
const NPV_TOLERANCE: Decimal = dec!(0.0001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MIN_RATE: Rate = dec!(-0.99);
const MAX_RATE: Rate = dec!(10);
const DERIVATIVE_FLOOR: Decimal = dec!(0.000000001);

/// Outcome of the Newton-Raphson search.
///
/// `converged == false` means the rate is a best-effort estimate: either the
/// vector has no sign change (no root exists) or the iteration cap was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrSolution {
    pub rate: Rate,
    pub converged: bool,
    pub iterations: u32,
}

/// Internal rate of return of a periodic cash-flow vector.
///
/// `cash_flows[0]` is the (negative) initial outlay. See [`solve_irr`].
pub fn irr(cash_flows: &[Money]) -> Rate {
    solve_irr(cash_flows).rate
}

/// Newton-Raphson IRR solver.
///
/// Starts at 10%, stops once `|NPV| < 1e-4` or after 100 iterations, and
/// clamps the rate into `[-0.99, 10]` after every step. A vanishing
/// derivative ends the search with a rate of zero. If discounting overflows
/// at a trial rate the step is halved back toward the last rate that could
/// be evaluated, so the solver never panics on extreme vectors.
pub fn solve_irr(cash_flows: &[Money]) -> IrrSolution {
    solve_irr_with_guess(cash_flows, INITIAL_GUESS)
}

/// [`solve_irr`] from an explicit starting rate. Monthly vectors start from
/// the monthly equivalent of 10% a year rather than 10% a month.
pub fn solve_irr_with_guess(cash_flows: &[Money], guess: Rate) -> IrrSolution {
    if cash_flows.len() < 2 {
        return IrrSolution {
            rate: Decimal::ZERO,
            converged: false,
            iterations: 0,
        };
    }

    let mut rate = guess.clamp(MIN_RATE, MAX_RATE);
    let mut last_evaluated = rate;

    for iteration in 1..=MAX_IRR_ITERATIONS {
        let Some((npv, dnpv)) = npv_and_derivative(cash_flows, rate) else {
            debug!("IRR: discounting overflowed at rate {rate}, backing off");
            rate = (rate + last_evaluated) / dec!(2);
            continue;
        };
        last_evaluated = rate;

        if npv.abs() < NPV_TOLERANCE {
            debug!("IRR converged to {rate} after {iteration} iterations");
            return IrrSolution {
                rate,
                converged: true,
                iterations: iteration,
            };
        }

        if dnpv.abs() < DERIVATIVE_FLOOR {
            debug!("IRR: derivative vanished at rate {rate}");
            return IrrSolution {
                rate: Decimal::ZERO,
                converged: false,
                iterations: iteration,
            };
        }

        let next = npv
            .checked_div(dnpv)
            .and_then(|step| rate.checked_sub(step))
            .unwrap_or(MAX_RATE);
        rate = next.clamp(MIN_RATE, MAX_RATE);
    }

    warn!("IRR did not converge within {MAX_IRR_ITERATIONS} iterations; last estimate {rate}");
    IrrSolution {
        rate,
        converged: false,
        iterations: MAX_IRR_ITERATIONS,
    }
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative -sum t * CF_t / (1+r)^(t+1).
/// `None` when any term leaves the Decimal range.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        npv = npv.checked_add(cf.checked_mul(discount)?)?;
        if t > 0 {
            let term = Decimal::from(t as i64)
                .checked_mul(*cf)?
                .checked_mul(discount)?
                .checked_div(one_plus_r)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_div(one_plus_r)?;
    }

    Some((npv, dnpv))
}
