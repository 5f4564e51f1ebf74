use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PropCalcError;
use crate::projection::{PeriodProjection, ScenarioInputs};
use crate::time_value::growth_factor;
use crate::types::{safe_div, Money, Rate, Years};
use crate::PropCalcResult;

/// How the terminal sale price is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitValuation {
    /// Forward NOI capitalised at the exit cap rate
    CapRate,
    /// Base value compounded at the appreciation rate over the hold
    #[default]
    Appreciation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitAssumptions {
    #[serde(default)]
    pub valuation: ExitValuation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_cap_rate: Option<Rate>,
    /// Broker, transfer and closing costs as a fraction of the sale price
    #[serde(default = "default_selling_cost_rate")]
    pub selling_cost_rate: Rate,
}

fn default_selling_cost_rate() -> Rate {
    dec!(0.06)
}

impl Default for ExitAssumptions {
    fn default() -> Self {
        ExitAssumptions {
            valuation: ExitValuation::default(),
            exit_cap_rate: None,
            selling_cost_rate: default_selling_cost_rate(),
        }
    }
}

/// Terminal sale waterfall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitProceeds {
    pub exit_value: Money,
    pub selling_costs: Money,
    pub loan_payoff: Money,
    pub net_proceeds: Money,
}

/// Value = NOI / cap rate. A non-positive cap rate yields zero.
pub fn cap_rate_exit_value(final_noi: Money, exit_cap_rate: Rate) -> Money {
    if exit_cap_rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    final_noi / exit_cap_rate
}

/// Value = base * (1 + appreciation)^years.
pub fn appreciation_exit_value(base_value: Money, appreciation_rate: Rate, hold_years: Years) -> Money {
    base_value * growth_factor(appreciation_rate, hold_years)
}

/// Exit value less selling costs less the outstanding loan.
pub fn net_sale_proceeds(exit_value: Money, selling_cost_rate: Rate, loan_balance: Money) -> ExitProceeds {
    let selling_costs = exit_value * selling_cost_rate;
    ExitProceeds {
        exit_value,
        selling_costs,
        loan_payoff: loan_balance,
        net_proceeds: exit_value - selling_costs - loan_balance,
    }
}

/// Sale at the end of a completed projection, priced per the scenario's
/// exit assumptions and netted against the final loan balance.
///
/// Cap-rate exits capitalise the final period's NOI annualised by the
/// period frequency.
pub fn evaluate_exit(
    inputs: &ScenarioInputs,
    projection: &[PeriodProjection],
) -> PropCalcResult<ExitProceeds> {
    let last = projection.last().ok_or_else(|| {
        PropCalcError::InsufficientData("Exit needs at least one projected period".into())
    })?;
    let ppy = Decimal::from(inputs.periods_per_year());

    let exit_value = match inputs.exit.valuation {
        ExitValuation::CapRate => {
            let cap = inputs.exit.exit_cap_rate.ok_or_else(|| {
                PropCalcError::invalid("exit.exit_cap_rate", "Required for cap-rate exits")
            })?;
            cap_rate_exit_value(last.noi * ppy, cap)
        }
        ExitValuation::Appreciation => {
            let years = safe_div(Decimal::from(last.period), ppy);
            appreciation_exit_value(inputs.base_value(), inputs.growth.appreciation_rate, years)
        }
    };

    Ok(net_sale_proceeds(
        exit_value,
        inputs.exit.selling_cost_rate,
        last.loan_balance,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::inputs::fixtures::fourplex;
    use crate::projection::project_cash_flows;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cap_rate_exit_value() {
        assert_eq!(cap_rate_exit_value(dec!(100000), dec!(0.05)), dec!(2000000));
        assert_eq!(cap_rate_exit_value(dec!(100000), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_net_proceeds_waterfall() {
        let p = net_sale_proceeds(dec!(2000000), dec!(0.05), dec!(1200000));
        assert_eq!(p.selling_costs, dec!(100000));
        assert_eq!(p.net_proceeds, dec!(700000));
    }

    #[test]
    fn test_appreciation_exit_value() {
        let v = appreciation_exit_value(dec!(100000), dec!(0.10), dec!(2));
        assert_eq!(v, dec!(121000));
    }

    #[test]
    fn test_evaluate_exit_uses_final_period() {
        let inputs = fourplex();
        let projection = project_cash_flows(&inputs).unwrap();
        let last = projection.periods.last().unwrap();
        let exit = evaluate_exit(&inputs, &projection.periods).unwrap();

        assert_eq!(exit.exit_value, last.noi / dec!(0.065));
        assert_eq!(exit.loan_payoff, last.loan_balance);
        assert_eq!(
            exit.net_proceeds,
            exit.exit_value - exit.selling_costs - last.loan_balance
        );
    }

    #[test]
    fn test_evaluate_exit_empty_projection() {
        let inputs = fourplex();
        assert!(evaluate_exit(&inputs, &[]).is_err());
    }
}
