use chrono::{Months, NaiveDate};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::{LoanState, PAYMENTS_PER_YEAR};
use crate::projection::inputs::{ManagementFeeBasis, ScenarioInputs};
use crate::time_value::growth_factor;
use crate::types::Money;
use crate::PropCalcResult;

/// One row of the projection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodProjection {
    /// 1-based period index
    pub period: u32,
    /// 1-based year containing the period
    pub year: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    /// Gross scheduled rent for the period
    pub gross_income: Money,
    pub vacancy_loss: Money,
    pub other_income: Money,
    pub effective_gross_income: Money,
    pub management_fee: Money,
    /// All operating expenses, management fee included
    pub operating_expenses: Money,
    pub noi: Money,
    pub debt_service: Money,
    /// One-time flows: refinance cash-out, capital calls, distributions
    pub event_cash_flow: Money,
    pub net_cash_flow: Money,
    pub cumulative_cash_flow: Money,
    pub loan_balance: Money,
    pub property_value: Money,
    pub equity: Money,
}

/// A cash-out refinance that closed during the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinanceEvent {
    pub period: u32,
    pub property_value: Money,
    pub old_balance: Money,
    pub new_loan: Money,
    pub refinance_cost: Money,
    pub cash_out: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowProjection {
    pub periods: Vec<PeriodProjection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinance: Option<RefinanceEvent>,
}

/// Build the ordered per-period projection for `inputs.horizon` periods.
///
/// Income and expenses step up once per year; property value compounds
/// continuously with elapsed time. Debt service for each period is the sum
/// of the monthly payments falling inside it, taken from whichever loan is
/// active. A configured refinance closes at the end of its period: the
/// cash-out lands in that period and the new loan services debt from the
/// next period on.
pub fn project_cash_flows(inputs: &ScenarioInputs) -> PropCalcResult<CashFlowProjection> {
    inputs.validate(&mut Vec::new())?;

    let ppy = inputs.periods_per_year();
    let ppy_dec = Decimal::from(ppy);
    let months_per_period = PAYMENTS_PER_YEAR / ppy;

    let mut loan = match &inputs.financing {
        Some(f) if f.ltv > Decimal::ZERO => Some(LoanState::new(
            inputs.loan_amount(),
            f.annual_rate,
            f.term_years,
            f.mode,
        )?),
        _ => None,
    };

    let base_value = inputs.base_value();
    let growth = &inputs.growth;
    let mut periods = Vec::with_capacity(inputs.horizon as usize);
    let mut refinance = None;
    let mut cumulative = Decimal::ZERO;

    for period in 1..=inputs.horizon {
        let year = inputs.frequency.year_of(period);
        let years_escalated = Decimal::from(year - 1);

        // --- Income ---
        let gross_income = inputs.gross_scheduled_rent / ppy_dec
            * growth_factor(growth.rent_growth, years_escalated);
        let vacancy_loss = gross_income * inputs.vacancy_rate;
        let other_income = inputs.other_income / ppy_dec
            * growth_factor(growth.other_income_growth, years_escalated);
        let effective_gross_income = gross_income - vacancy_loss + other_income;

        // --- Expenses ---
        let line_items: Money = inputs
            .expenses
            .iter()
            .map(|item| {
                let rate = item.growth_rate.unwrap_or(growth.expense_growth);
                item.annual_amount / ppy_dec * growth_factor(rate, years_escalated)
            })
            .sum();
        let fee_basis = match inputs.management_fee_basis {
            ManagementFeeBasis::EffectiveGrossIncome => effective_gross_income,
            ManagementFeeBasis::GrossRent => gross_income,
        };
        let management_fee = fee_basis * inputs.management_fee_rate;
        let operating_expenses = line_items + management_fee;
        let noi = effective_gross_income - operating_expenses;

        // --- Debt ---
        let debt_service = match loan.as_mut() {
            Some(l) => {
                let ds = l.debt_service(months_per_period);
                l.advance(months_per_period);
                ds
            }
            None => Decimal::ZERO,
        };

        let property_value = base_value
            * growth_factor(growth.appreciation_rate, Decimal::from(period) / ppy_dec);

        let mut event_cash_flow: Money = inputs
            .capital_events
            .iter()
            .filter(|e| e.period == period)
            .map(|e| e.amount)
            .sum();

        if let Some(terms) = inputs.refinance.as_ref().filter(|r| r.period == period) {
            let old_balance = loan.as_ref().map(LoanState::balance).unwrap_or(Decimal::ZERO);
            let new_loan = property_value * terms.new_ltv;
            let refinance_cost = new_loan * terms.cost_rate;
            let cash_out = new_loan - old_balance - refinance_cost;
            debug!(
                "refinance at period {period}: value {property_value}, new loan {new_loan}, cash out {cash_out}"
            );

            loan = Some(LoanState::new(
                new_loan,
                terms.annual_rate,
                terms.term_years,
                terms.mode,
            )?);
            event_cash_flow += cash_out;
            refinance = Some(RefinanceEvent {
                period,
                property_value,
                old_balance,
                new_loan,
                refinance_cost,
                cash_out,
            });
        }

        let loan_balance = loan.as_ref().map(LoanState::balance).unwrap_or(Decimal::ZERO);
        let net_cash_flow = noi - debt_service + event_cash_flow;
        cumulative += net_cash_flow;

        let period_end = inputs
            .start_date
            .and_then(|d| d.checked_add_months(Months::new(period * months_per_period)));

        periods.push(PeriodProjection {
            period,
            year,
            period_end,
            gross_income,
            vacancy_loss,
            other_income,
            effective_gross_income,
            management_fee,
            operating_expenses,
            noi,
            debt_service,
            event_cash_flow,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
            loan_balance,
            property_value,
            equity: property_value - loan_balance,
        });
    }

    Ok(CashFlowProjection { periods, refinance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::{self, DebtServiceMode};
    use crate::projection::inputs::fixtures::fourplex;
    use crate::projection::inputs::{CapitalEvent, RefinanceTerms};
    use crate::types::PeriodFrequency;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_length_matches_horizon() {
        let out = project_cash_flows(&fourplex()).unwrap();
        assert_eq!(out.periods.len(), 10);
        assert_eq!(out.periods[0].period, 1);
        assert_eq!(out.periods[9].period, 10);
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let mut inputs = fourplex();
        inputs.horizon = 0;
        let out = project_cash_flows(&inputs).unwrap();
        assert!(out.periods.is_empty());
    }

    #[test]
    fn test_year_one_income_statement() {
        let out = project_cash_flows(&fourplex()).unwrap();
        let y1 = &out.periods[0];

        assert_eq!(y1.gross_income, dec!(57600));
        assert_eq!(y1.vacancy_loss, dec!(2880));
        assert_eq!(y1.effective_gross_income, dec!(57120));
        // 8% of EGI
        assert_eq!(y1.management_fee, dec!(4569.60));
        assert_eq!(y1.operating_expenses, dec!(16569.60));
        assert_eq!(y1.noi, dec!(40550.40));
    }

    #[test]
    fn test_gross_rent_fee_basis() {
        let mut inputs = fourplex();
        inputs.management_fee_basis = ManagementFeeBasis::GrossRent;
        let out = project_cash_flows(&inputs).unwrap();
        assert_eq!(out.periods[0].management_fee, dec!(4608.00));
    }

    #[test]
    fn test_escalation_by_year() {
        let out = project_cash_flows(&fourplex()).unwrap();
        assert_eq!(out.periods[1].gross_income, dec!(59328));
        assert_eq!(out.periods[2].gross_income, dec!(57600) * dec!(1.0609));
    }

    #[test]
    fn test_noi_identity_over_thirty_periods() {
        let mut inputs = fourplex();
        inputs.horizon = 30;
        let out = project_cash_flows(&inputs).unwrap();
        assert_eq!(out.periods.len(), 30);
        for row in &out.periods {
            assert_eq!(row.noi, row.effective_gross_income - row.operating_expenses);
        }
    }

    #[test]
    fn test_cumulative_is_running_sum() {
        let out = project_cash_flows(&fourplex()).unwrap();
        let mut running = Decimal::ZERO;
        for row in &out.periods {
            running += row.net_cash_flow;
            assert_eq!(row.cumulative_cash_flow, running);
        }
    }

    #[test]
    fn test_debt_service_is_twelve_payments() {
        let inputs = fourplex();
        let out = project_cash_flows(&inputs).unwrap();
        let pmt = amortization::payment(dec!(300000), dec!(0.065), 30).unwrap();
        assert_eq!(out.periods[0].debt_service, pmt * dec!(12));
        let bal = amortization::remaining_balance(dec!(300000), dec!(0.065), 30, 12).unwrap();
        assert_eq!(out.periods[0].loan_balance, bal);
    }

    #[test]
    fn test_balance_non_increasing_without_refinance() {
        let out = project_cash_flows(&fourplex()).unwrap();
        for w in out.periods.windows(2) {
            assert!(w[1].loan_balance <= w[0].loan_balance);
            assert!(w[1].loan_balance >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_monthly_frequency() {
        let mut inputs = fourplex();
        inputs.frequency = PeriodFrequency::Monthly;
        inputs.horizon = 24;
        inputs.start_date = NaiveDate::from_ymd_opt(2026, 1, 31);
        let out = project_cash_flows(&inputs).unwrap();

        assert_eq!(out.periods.len(), 24);
        assert_eq!(out.periods[0].gross_income, dec!(4800));
        assert_eq!(out.periods[11].gross_income, dec!(4800));
        assert_eq!(out.periods[12].gross_income, dec!(4944));
        assert_eq!(out.periods[12].year, 2);
        assert_eq!(out.periods[0].period_end, NaiveDate::from_ymd_opt(2026, 2, 28));
        let pmt = amortization::payment(dec!(300000), dec!(0.065), 30).unwrap();
        assert_eq!(out.periods[0].debt_service, pmt);
    }

    #[test]
    fn test_refinance_replaces_loan() {
        let mut inputs = fourplex();
        inputs.refinance = Some(RefinanceTerms {
            period: 3,
            new_ltv: dec!(0.75),
            annual_rate: dec!(0.06),
            term_years: 30,
            cost_rate: dec!(0.02),
            mode: DebtServiceMode::Amortizing,
        });
        let out = project_cash_flows(&inputs).unwrap();
        let refi = out.refinance.clone().unwrap();
        let row3 = &out.periods[2];

        assert_eq!(refi.period, 3);
        assert_eq!(refi.property_value, row3.property_value);
        assert_eq!(refi.new_loan, row3.property_value * dec!(0.75));
        assert_eq!(refi.refinance_cost, refi.new_loan * dec!(0.02));
        assert_eq!(
            refi.cash_out,
            refi.new_loan - refi.old_balance - refi.refinance_cost
        );
        assert_eq!(row3.event_cash_flow, refi.cash_out);
        assert_eq!(row3.loan_balance, refi.new_loan);

        let new_pmt = amortization::payment(refi.new_loan, dec!(0.06), 30).unwrap();
        assert_eq!(out.periods[3].debt_service, new_pmt * dec!(12));
    }

    #[test]
    fn test_capital_event_in_period() {
        let mut inputs = fourplex();
        inputs.capital_events = vec![CapitalEvent {
            period: 4,
            amount: dec!(-15000),
            label: "roof".into(),
        }];
        let base = project_cash_flows(&fourplex()).unwrap();
        let out = project_cash_flows(&inputs).unwrap();
        assert_eq!(out.periods[3].event_cash_flow, dec!(-15000));
        assert_eq!(
            out.periods[3].net_cash_flow,
            base.periods[3].net_cash_flow - dec!(15000)
        );
    }

    #[test]
    fn test_zero_growth_keeps_income_flat() {
        let mut inputs = fourplex();
        inputs.growth = Default::default();
        for item in inputs.expenses.iter_mut() {
            item.growth_rate = None;
        }
        let out = project_cash_flows(&inputs).unwrap();
        assert_eq!(out.periods[0].noi, out.periods[9].noi);
        assert_eq!(out.periods[9].property_value, dec!(400000));
    }
}
