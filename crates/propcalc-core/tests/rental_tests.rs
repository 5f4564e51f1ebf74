use propcalc_core::amortization::{self, DebtServiceMode};
use propcalc_core::analysis::rental::{analyze_rental, compute_metrics};
use propcalc_core::exit::{ExitAssumptions, ExitValuation};
use propcalc_core::irr::solve_irr;
use propcalc_core::projection::{
    project_cash_flows, CapitalEvent, ExpenseLineItem, FinancingTerms, GrowthAssumptions,
    ManagementFeeBasis, RefinanceTerms, ScenarioInputs,
};
use propcalc_core::time_value::npv;
use propcalc_core::{PeriodFrequency, PropCalcError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn single_family() -> ScenarioInputs {
    // Single-family rental: 280k, 20% down, rent 2,300/month
    ScenarioInputs {
        property_name: "Maple Court".into(),
        purchase_price: dec!(280_000),
        closing_costs: dec!(6_000),
        rehab_costs: dec!(10_000),
        base_value: None,
        financing: Some(FinancingTerms {
            ltv: dec!(0.80),
            annual_rate: dec!(0.07),
            term_years: 30,
            points: Decimal::ZERO,
            mode: DebtServiceMode::Amortizing,
        }),
        gross_scheduled_rent: dec!(27_600),
        vacancy_rate: dec!(0.05),
        other_income: Decimal::ZERO,
        growth: GrowthAssumptions {
            rent_growth: dec!(0.03),
            other_income_growth: Decimal::ZERO,
            expense_growth: dec!(0.03),
            appreciation_rate: dec!(0.035),
        },
        expenses: vec![
            ExpenseLineItem {
                name: "taxes".into(),
                annual_amount: dec!(3_600),
                growth_rate: None,
            },
            ExpenseLineItem {
                name: "insurance".into(),
                annual_amount: dec!(1_500),
                growth_rate: None,
            },
            ExpenseLineItem {
                name: "maintenance".into(),
                annual_amount: dec!(1_800),
                growth_rate: None,
            },
        ],
        management_fee_rate: dec!(0.08),
        management_fee_basis: ManagementFeeBasis::GrossRent,
        horizon: 30,
        frequency: PeriodFrequency::Annual,
        refinance: None,
        capital_events: vec![],
        exit: ExitAssumptions {
            valuation: ExitValuation::Appreciation,
            exit_cap_rate: None,
            selling_cost_rate: dec!(0.06),
        },
        start_date: None,
    }
}

// ===========================================================================
// Projection invariants
// ===========================================================================

#[test]
fn test_noi_identity_every_period() {
    let projection = project_cash_flows(&single_family()).unwrap();
    assert_eq!(projection.periods.len(), 30);
    for p in &projection.periods {
        assert_eq!(p.noi, p.effective_gross_income - p.operating_expenses);
        assert_eq!(
            p.effective_gross_income,
            p.gross_income - p.vacancy_loss + p.other_income
        );
    }
}

#[test]
fn test_cumulative_is_running_sum() {
    let projection = project_cash_flows(&single_family()).unwrap();
    let mut running = Decimal::ZERO;
    for p in &projection.periods {
        running += p.net_cash_flow;
        assert_eq!(p.cumulative_cash_flow, running);
    }
}

#[test]
fn test_loan_balance_declines_to_zero_at_term() {
    let projection = project_cash_flows(&single_family()).unwrap();
    let balances: Vec<Decimal> = projection.periods.iter().map(|p| p.loan_balance).collect();
    for pair in balances.windows(2) {
        assert!(pair[1] <= pair[0]);
        assert!(pair[1] >= Decimal::ZERO);
    }
    assert_eq!(*balances.last().unwrap(), Decimal::ZERO);
}

#[test]
fn test_management_fee_on_gross_rent() {
    let projection = project_cash_flows(&single_family()).unwrap();
    let y1 = &projection.periods[0];
    assert_eq!(y1.management_fee, dec!(27_600) * dec!(0.08));
}

#[test]
fn test_horizon_limit() {
    let mut inputs = single_family();
    inputs.horizon = 31;
    match project_cash_flows(&inputs) {
        Err(PropCalcError::InvalidInput { field, .. }) => assert_eq!(field, "horizon"),
        other => panic!("expected horizon error, got {other:?}"),
    }

    inputs.frequency = PeriodFrequency::Monthly;
    inputs.horizon = 121;
    assert!(project_cash_flows(&inputs).is_err());
}

#[test]
fn test_zero_horizon_is_empty_projection() {
    let mut inputs = single_family();
    inputs.horizon = 0;
    assert!(project_cash_flows(&inputs).unwrap().periods.is_empty());
}

// ===========================================================================
// Refinance and capital events
// ===========================================================================

#[test]
fn test_cash_out_refinance() {
    let mut inputs = single_family();
    inputs.horizon = 10;
    inputs.refinance = Some(RefinanceTerms {
        period: 5,
        new_ltv: dec!(0.75),
        annual_rate: dec!(0.065),
        term_years: 30,
        cost_rate: dec!(0.02),
        mode: DebtServiceMode::Amortizing,
    });
    let projection = project_cash_flows(&inputs).unwrap();
    let refi = projection.refinance.as_ref().unwrap();
    let p5 = &projection.periods[4];
    let p6 = &projection.periods[5];

    let old_balance = amortization::remaining_balance(dec!(224_000), dec!(0.07), 30, 60).unwrap();
    assert_eq!(refi.old_balance, old_balance);
    assert_eq!(refi.new_loan, p5.property_value * dec!(0.75));
    assert_eq!(refi.cash_out, refi.new_loan - old_balance - refi.refinance_cost);
    assert_eq!(p5.event_cash_flow, refi.cash_out);
    assert_eq!(p5.loan_balance, refi.new_loan);

    let new_payment = amortization::payment(refi.new_loan, dec!(0.065), 30).unwrap();
    assert_eq!(p6.debt_service, new_payment * dec!(12));
}

#[test]
fn test_capital_event_lands_in_its_period() {
    let mut inputs = single_family();
    inputs.horizon = 5;
    inputs.capital_events = vec![CapitalEvent {
        period: 3,
        amount: dec!(-8_000),
        label: "roof".into(),
    }];
    let with_event = project_cash_flows(&inputs).unwrap();
    inputs.capital_events.clear();
    let without = project_cash_flows(&inputs).unwrap();

    assert_eq!(with_event.periods[2].event_cash_flow, dec!(-8_000));
    assert_eq!(
        with_event.periods[2].net_cash_flow,
        without.periods[2].net_cash_flow - dec!(8_000)
    );
    assert_eq!(with_event.periods[3].net_cash_flow, without.periods[3].net_cash_flow);
}

// ===========================================================================
// Pipeline
// ===========================================================================

#[test]
fn test_irr_round_trip_on_projected_vector() {
    let mut inputs = single_family();
    inputs.horizon = 10;
    let out = analyze_rental(&inputs).unwrap().result;

    // Re-price the same inflows at a known rate and solve again.
    let target = dec!(0.11);
    let mut flows = out.cash_flow_vector.clone();
    flows[0] = Decimal::ZERO;
    flows[0] = -npv(target, &flows).unwrap();
    let solution = solve_irr(&flows);
    assert!(solution.converged);
    assert!((solution.rate - target).abs() < dec!(0.000001));
}

#[test]
fn test_interest_only_keeps_balance_flat() {
    let mut inputs = single_family();
    inputs.horizon = 5;
    if let Some(f) = inputs.financing.as_mut() {
        f.mode = DebtServiceMode::InterestOnly;
    }
    let projection = project_cash_flows(&inputs).unwrap();
    for p in &projection.periods {
        assert_eq!(p.loan_balance, dec!(224_000));
        assert!((p.debt_service - dec!(15_680)).abs() < dec!(0.000001));
    }
}

#[test]
fn test_metrics_match_full_analysis() {
    let mut inputs = single_family();
    inputs.horizon = 7;
    let metrics = compute_metrics(&inputs).unwrap();
    let full = analyze_rental(&inputs).unwrap().result;
    assert_eq!(metrics.irr, full.irr);
    assert_eq!(metrics.total_profit, full.total_profit);
    assert_eq!(metrics.dscr_year1, full.dscr_year1);
}

#[test]
fn test_period_end_dates() {
    let mut inputs = single_family();
    inputs.horizon = 24;
    inputs.frequency = PeriodFrequency::Monthly;
    inputs.start_date = chrono::NaiveDate::from_ymd_opt(2025, 1, 31);
    let projection = project_cash_flows(&inputs).unwrap();
    assert_eq!(
        projection.periods[0].period_end,
        chrono::NaiveDate::from_ymd_opt(2025, 2, 28)
    );
    assert_eq!(
        projection.periods[23].period_end,
        chrono::NaiveDate::from_ymd_opt(2027, 1, 31)
    );
}
