pub mod break_even;
pub mod grid;
pub mod stress;
pub mod tornado;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analysis::rental::{compute_metrics, ScenarioMetrics};
use crate::error::PropCalcError;
use crate::projection::ScenarioInputs;
use crate::PropCalcResult;

pub use break_even::{analyze_break_even, break_even, BreakEvenInput, BreakEvenResult};
pub use grid::{sensitivity_grid, GridInput, GridOutput, SweepRange};
pub use stress::{
    default_stress_scenarios, stress_test, unused_shock_target, Shock, StressScenario,
    StressTestInput,
};
pub use tornado::{tornado, TornadoBar, TornadoInput, TornadoOutput};

/// A scenario input that can be perturbed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityVariable {
    PurchasePrice,
    /// Annual gross scheduled rent
    GrossRent,
    VacancyRate,
    /// Rate on the acquisition loan
    InterestRate,
    RentGrowth,
    ExpenseGrowth,
    ExitCapRate,
    AppreciationRate,
}

impl SensitivityVariable {
    pub const ALL: [SensitivityVariable; 8] = [
        SensitivityVariable::PurchasePrice,
        SensitivityVariable::GrossRent,
        SensitivityVariable::VacancyRate,
        SensitivityVariable::InterestRate,
        SensitivityVariable::RentGrowth,
        SensitivityVariable::ExpenseGrowth,
        SensitivityVariable::ExitCapRate,
        SensitivityVariable::AppreciationRate,
    ];

    /// Current value, or `None` when the scenario does not use the input
    /// (no financing, no exit cap rate).
    pub fn get(self, inputs: &ScenarioInputs) -> Option<Decimal> {
        match self {
            SensitivityVariable::PurchasePrice => Some(inputs.purchase_price),
            SensitivityVariable::GrossRent => Some(inputs.gross_scheduled_rent),
            SensitivityVariable::VacancyRate => Some(inputs.vacancy_rate),
            SensitivityVariable::InterestRate => inputs.financing.as_ref().map(|f| f.annual_rate),
            SensitivityVariable::RentGrowth => Some(inputs.growth.rent_growth),
            SensitivityVariable::ExpenseGrowth => Some(inputs.growth.expense_growth),
            SensitivityVariable::ExitCapRate => inputs.exit.exit_cap_rate,
            SensitivityVariable::AppreciationRate => Some(inputs.growth.appreciation_rate),
        }
    }

    pub fn set(self, inputs: &mut ScenarioInputs, value: Decimal) -> PropCalcResult<()> {
        match self {
            SensitivityVariable::PurchasePrice => inputs.purchase_price = value,
            SensitivityVariable::GrossRent => inputs.gross_scheduled_rent = value,
            SensitivityVariable::VacancyRate => inputs.vacancy_rate = value,
            SensitivityVariable::InterestRate => match inputs.financing.as_mut() {
                Some(f) => f.annual_rate = value,
                None => {
                    return Err(PropCalcError::invalid(
                        "interest_rate",
                        "Scenario has no financing to perturb",
                    ))
                }
            },
            SensitivityVariable::RentGrowth => inputs.growth.rent_growth = value,
            SensitivityVariable::ExpenseGrowth => inputs.growth.expense_growth = value,
            SensitivityVariable::ExitCapRate => inputs.exit.exit_cap_rate = Some(value),
            SensitivityVariable::AppreciationRate => inputs.growth.appreciation_rate = value,
        }
        Ok(())
    }

    /// Copy of `inputs` with this variable set to `value`.
    pub fn perturbed(self, inputs: &ScenarioInputs, value: Decimal) -> PropCalcResult<ScenarioInputs> {
        let mut copy = inputs.clone();
        self.set(&mut copy, value)?;
        Ok(copy)
    }
}

/// Headline output a sensitivity run measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Irr,
    CashOnCash,
    Dscr,
    NetCashFlowYear1,
    EquityMultiple,
    TotalProfit,
}

impl Metric {
    pub fn of(self, metrics: &ScenarioMetrics) -> Decimal {
        match self {
            Metric::Irr => metrics.irr,
            Metric::CashOnCash => metrics.cash_on_cash_year1,
            Metric::Dscr => metrics.dscr_year1,
            Metric::NetCashFlowYear1 => metrics.net_cash_flow_year1,
            Metric::EquityMultiple => metrics.equity_multiple,
            Metric::TotalProfit => metrics.total_profit,
        }
    }
}

/// Run the full pipeline on `inputs` and read one metric.
pub fn evaluate_metric(inputs: &ScenarioInputs, metric: Metric) -> PropCalcResult<Decimal> {
    Ok(metric.of(&compute_metrics(inputs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::inputs::fixtures::fourplex;
    use rust_decimal_macros::dec;

    #[test]
    fn test_get_set_round_trip() {
        let base = fourplex();
        for var in SensitivityVariable::ALL {
            let current = var.get(&base).unwrap();
            let copy = var.perturbed(&base, current + dec!(0.01)).unwrap();
            assert_eq!(var.get(&copy), Some(current + dec!(0.01)), "{var:?}");
        }
    }

    #[test]
    fn test_interest_rate_needs_financing() {
        let mut base = fourplex();
        base.financing = None;
        assert_eq!(SensitivityVariable::InterestRate.get(&base), None);
        assert!(SensitivityVariable::InterestRate
            .perturbed(&base, dec!(0.07))
            .is_err());
    }

    #[test]
    fn test_higher_rent_raises_every_metric() {
        let base = fourplex();
        let richer = SensitivityVariable::GrossRent
            .perturbed(&base, dec!(64000))
            .unwrap();
        for metric in [Metric::Irr, Metric::CashOnCash, Metric::Dscr, Metric::TotalProfit] {
            assert!(
                evaluate_metric(&richer, metric).unwrap() > evaluate_metric(&base, metric).unwrap(),
                "{metric:?}"
            );
        }
    }
}
