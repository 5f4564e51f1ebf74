#![cfg(feature = "sensitivity")]

use propcalc_core::amortization::DebtServiceMode;
use propcalc_core::exit::{ExitAssumptions, ExitValuation};
use propcalc_core::projection::{
    ExpenseLineItem, FinancingTerms, GrowthAssumptions, ManagementFeeBasis, ScenarioInputs,
};
use propcalc_core::sensitivity::{
    analyze_break_even, break_even, evaluate_metric, sensitivity_grid, stress_test, tornado,
    BreakEvenInput, GridInput, Metric, SensitivityVariable, Shock, StressScenario, SweepRange,
};
use propcalc_core::PeriodFrequency;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn sixplex() -> ScenarioInputs {
    ScenarioInputs {
        property_name: "Harbor Sixplex".into(),
        purchase_price: dec!(720_000),
        closing_costs: dec!(14_000),
        rehab_costs: Decimal::ZERO,
        base_value: None,
        financing: Some(FinancingTerms {
            ltv: dec!(0.75),
            annual_rate: dec!(0.068),
            term_years: 30,
            points: dec!(0.01),
            mode: DebtServiceMode::Amortizing,
        }),
        gross_scheduled_rent: dec!(86_400),
        vacancy_rate: dec!(0.05),
        other_income: dec!(2_400),
        growth: GrowthAssumptions {
            rent_growth: dec!(0.03),
            other_income_growth: dec!(0.02),
            expense_growth: dec!(0.03),
            appreciation_rate: dec!(0.03),
        },
        expenses: vec![
            ExpenseLineItem {
                name: "taxes".into(),
                annual_amount: dec!(9_600),
                growth_rate: Some(dec!(0.02)),
            },
            ExpenseLineItem {
                name: "insurance".into(),
                annual_amount: dec!(4_200),
                growth_rate: None,
            },
            ExpenseLineItem {
                name: "repairs".into(),
                annual_amount: dec!(6_000),
                growth_rate: None,
            },
        ],
        management_fee_rate: dec!(0.07),
        management_fee_basis: ManagementFeeBasis::EffectiveGrossIncome,
        horizon: 10,
        frequency: PeriodFrequency::Annual,
        refinance: None,
        capital_events: vec![],
        exit: ExitAssumptions {
            valuation: ExitValuation::CapRate,
            exit_cap_rate: Some(dec!(0.065)),
            selling_cost_rate: dec!(0.05),
        },
        start_date: None,
    }
}

#[test]
fn test_break_even_vacancy_for_zero_cash_flow() {
    let base = sixplex();
    let vacancy = break_even(
        &base,
        SensitivityVariable::VacancyRate,
        Metric::NetCashFlowYear1,
        Decimal::ZERO,
        Decimal::ZERO,
        dec!(0.9),
    )
    .unwrap()
    .unwrap();

    let at = SensitivityVariable::VacancyRate.perturbed(&base, vacancy).unwrap();
    let cash_flow = evaluate_metric(&at, Metric::NetCashFlowYear1).unwrap();
    assert!(cash_flow.abs() < dec!(0.01), "cash flow {cash_flow}");
}

#[test]
fn test_break_even_reports_margin() {
    let out = analyze_break_even(&BreakEvenInput {
        scenario: sixplex(),
        variable: SensitivityVariable::InterestRate,
        metric: Metric::Dscr,
        threshold: Decimal::ONE,
        low: dec!(0.01),
        high: dec!(0.20),
    })
    .unwrap()
    .result;

    let rate = out.break_even_value.unwrap();
    assert!(rate > dec!(0.068));
    assert!(out.margin_of_safety.unwrap() > Decimal::ZERO);
}

#[test]
fn test_custom_stress_scenario() {
    let out = stress_test(
        &sixplex(),
        &[StressScenario {
            name: "half the tenants leave".into(),
            shocks: vec![Shock::VacancyAdd(dec!(0.50))],
        }],
    )
    .unwrap();
    let r = &out.result.results[0];
    assert!(r.dscr_breach);
    assert!(r.negative_cash_flow);
    assert_eq!(out.result.worst_case.as_deref(), Some("half the tenants leave"));
    assert!(out.warnings.iter().any(|w| w.contains("DSCR")));
}

#[test]
fn test_default_stress_set() {
    let out = stress_test(&sixplex(), &[]).unwrap().result;
    assert_eq!(out.results.len(), 6);
    for r in &out.results {
        assert!(r.metrics.irr <= out.baseline.irr, "{}", r.name);
    }
}

#[test]
fn test_tornado_covers_used_inputs() {
    let out = tornado(&sixplex(), Metric::Irr, dec!(0.10)).unwrap().result;
    assert_eq!(out.bars.len(), SensitivityVariable::ALL.len());
    assert!(out.bars[0].spread >= out.bars[out.bars.len() - 1].spread);
}

#[test]
fn test_grid_matrix_shape() {
    let out = sensitivity_grid(&GridInput {
        scenario: sixplex(),
        variable_1: SweepRange {
            variable: SensitivityVariable::ExitCapRate,
            min: dec!(0.055),
            max: dec!(0.075),
            step: dec!(0.005),
        },
        variable_2: SweepRange {
            variable: SensitivityVariable::RentGrowth,
            min: dec!(0.01),
            max: dec!(0.04),
            step: dec!(0.01),
        },
        metric: Metric::Irr,
    })
    .unwrap()
    .result;

    assert_eq!(out.matrix.len(), 5);
    assert!(out.matrix.iter().all(|row| row.len() == 4));
    // Higher exit cap, lower sale price, lower IRR.
    assert!(out.matrix[0][0] > out.matrix[4][0]);
    assert_eq!(out.base_case_position, (2, 2));
}
