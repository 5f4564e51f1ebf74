use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::rental::{compute_metrics, ScenarioMetrics};
use crate::error::PropCalcError;
use crate::exit::valuation::ExitValuation;
use crate::projection::ScenarioInputs;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::PropCalcResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One perturbation. Multipliers scale the base amount; additive shocks are
/// absolute rate changes (0.02 = +200 bps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Shock {
    RentMultiplier(Decimal),
    ExpenseMultiplier(Decimal),
    ValueMultiplier(Decimal),
    InterestRateAdd(Rate),
    VacancyAdd(Rate),
    ExitCapRateAdd(Rate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub shocks: Vec<Shock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestInput {
    pub scenario: ScenarioInputs,
    /// Falls back to [`default_stress_scenarios`] when empty
    #[serde(default)]
    pub scenarios: Vec<StressScenario>,
}

/// Stressed minus baseline, per metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDeltas {
    pub irr: Rate,
    pub cash_on_cash_year1: Rate,
    pub dscr_year1: Decimal,
    pub net_cash_flow_year1: Money,
    pub equity_multiple: Decimal,
    pub total_profit: Money,
}

impl MetricDeltas {
    fn between(stressed: &ScenarioMetrics, baseline: &ScenarioMetrics) -> Self {
        MetricDeltas {
            irr: stressed.irr - baseline.irr,
            cash_on_cash_year1: stressed.cash_on_cash_year1 - baseline.cash_on_cash_year1,
            dscr_year1: stressed.dscr_year1 - baseline.dscr_year1,
            net_cash_flow_year1: stressed.net_cash_flow_year1 - baseline.net_cash_flow_year1,
            equity_multiple: stressed.equity_multiple - baseline.equity_multiple,
            total_profit: stressed.total_profit - baseline.total_profit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressResult {
    pub name: String,
    pub metrics: ScenarioMetrics,
    pub deltas: MetricDeltas,
    /// Year-1 DSCR under 1.0 on a levered deal
    pub dscr_breach: bool,
    pub negative_cash_flow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestOutput {
    pub baseline: ScenarioMetrics,
    pub results: Vec<StressResult>,
    /// Scenario with the lowest IRR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_case: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The standard downside set.
pub fn default_stress_scenarios() -> Vec<StressScenario> {
    let single = |name: &str, shock: Shock| StressScenario {
        name: name.into(),
        shocks: vec![shock],
    };
    vec![
        single("-10% rent", Shock::RentMultiplier(dec!(0.90))),
        single("+200 bps rate", Shock::InterestRateAdd(dec!(0.02))),
        single("+5 pts vacancy", Shock::VacancyAdd(dec!(0.05))),
        single("+15% expenses", Shock::ExpenseMultiplier(dec!(1.15))),
        single("+100 bps exit cap", Shock::ExitCapRateAdd(dec!(0.01))),
        StressScenario {
            name: "combined downturn".into(),
            shocks: vec![
                Shock::RentMultiplier(dec!(0.90)),
                Shock::VacancyAdd(dec!(0.05)),
                Shock::ExpenseMultiplier(dec!(1.10)),
                Shock::InterestRateAdd(dec!(0.01)),
                Shock::ExitCapRateAdd(dec!(0.01)),
                Shock::ValueMultiplier(dec!(0.90)),
            ],
        },
    ]
}

/// Copy of `base` with every shock applied in order. Rates are floored at
/// zero and vacancy is capped at 100%.
pub fn apply_shocks(base: &ScenarioInputs, shocks: &[Shock]) -> PropCalcResult<ScenarioInputs> {
    let mut s = base.clone();
    for shock in shocks {
        match *shock {
            Shock::RentMultiplier(m) => {
                check_multiplier(m)?;
                s.gross_scheduled_rent *= m;
            }
            Shock::ExpenseMultiplier(m) => {
                check_multiplier(m)?;
                for item in &mut s.expenses {
                    item.annual_amount *= m;
                }
            }
            Shock::ValueMultiplier(m) => {
                check_multiplier(m)?;
                s.base_value = Some(s.base_value() * m);
            }
            Shock::InterestRateAdd(d) => {
                if let Some(f) = s.financing.as_mut() {
                    f.annual_rate = (f.annual_rate + d).max(Decimal::ZERO);
                }
                if let Some(r) = s.refinance.as_mut() {
                    r.annual_rate = (r.annual_rate + d).max(Decimal::ZERO);
                }
            }
            Shock::VacancyAdd(d) => {
                s.vacancy_rate = (s.vacancy_rate + d).clamp(Decimal::ZERO, Decimal::ONE);
            }
            Shock::ExitCapRateAdd(d) => {
                if let Some(cap) = s.exit.exit_cap_rate.as_mut() {
                    *cap += d;
                }
            }
        }
    }
    Ok(s)
}

/// Name of the input a shock would move when `inputs` never reads it.
pub fn unused_shock_target(inputs: &ScenarioInputs, shock: &Shock) -> Option<&'static str> {
    match shock {
        Shock::ExitCapRateAdd(_) if inputs.exit.valuation != ExitValuation::CapRate => {
            Some("exit cap rate (the exit is valued by appreciation)")
        }
        Shock::InterestRateAdd(_) if inputs.financing.is_none() && inputs.refinance.is_none() => {
            Some("interest rate (the scenario carries no debt)")
        }
        _ => None,
    }
}

/// Re-run the pipeline under each scenario and report deltas against the
/// unshocked baseline.
pub fn stress_test(
    inputs: &ScenarioInputs,
    scenarios: &[StressScenario],
) -> PropCalcResult<ComputationOutput<StressTestOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    inputs.validate(&mut warnings)?;
    let baseline = compute_metrics(inputs)?;
    let levered = inputs.loan_amount() > Decimal::ZERO;

    let defaults;
    let scenarios = if scenarios.is_empty() {
        defaults = default_stress_scenarios();
        &defaults[..]
    } else {
        scenarios
    };

    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        for target in scenario.shocks.iter().filter_map(|s| unused_shock_target(inputs, s)) {
            warnings.push(format!(
                "Scenario '{}': shock to {target} has no effect",
                scenario.name
            ));
        }
        let stressed = apply_shocks(inputs, &scenario.shocks)?;
        let metrics = match compute_metrics(&stressed) {
            Ok(m) => m,
            Err(e) => {
                warnings.push(format!("Scenario '{}' could not be evaluated: {e}", scenario.name));
                continue;
            }
        };
        if !metrics.irr_converged {
            warnings.push(format!("Scenario '{}': IRR did not converge", scenario.name));
        }
        results.push(StressResult {
            name: scenario.name.clone(),
            deltas: MetricDeltas::between(&metrics, &baseline),
            dscr_breach: levered && metrics.dscr_year1 < Decimal::ONE,
            negative_cash_flow: metrics.net_cash_flow_year1 < Decimal::ZERO,
            metrics,
        });
    }

    let worst_case = results
        .iter()
        .min_by(|a, b| a.metrics.irr.cmp(&b.metrics.irr))
        .map(|r| r.name.clone());

    let breaches = results.iter().filter(|r| r.dscr_breach).count();
    if breaches > 0 {
        warnings.push(format!("{breaches} scenario(s) push year-1 DSCR below 1.0x"));
    }

    let output = StressTestOutput {
        baseline,
        results,
        worst_case,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Stress Testing (shocked re-projection vs baseline)",
        &serde_json::json!({
            "scenario": inputs,
            "stress_scenarios": scenarios,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn check_multiplier(m: Decimal) -> PropCalcResult<()> {
    if m < Decimal::ZERO {
        return Err(PropCalcError::invalid("shock", "Multipliers cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::inputs::fixtures::fourplex;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_scenarios_all_hurt() {
        let out = stress_test(&fourplex(), &[]).unwrap().result;
        assert_eq!(out.results.len(), 6);
        for r in &out.results {
            assert!(r.deltas.total_profit < Decimal::ZERO, "{}", r.name);
        }
        assert_eq!(out.worst_case.as_deref(), Some("combined downturn"));
    }

    #[test]
    fn test_rate_shock_hits_debt_metrics() {
        let out = stress_test(
            &fourplex(),
            &[StressScenario {
                name: "rate".into(),
                shocks: vec![Shock::InterestRateAdd(dec!(0.02))],
            }],
        )
        .unwrap()
        .result;
        let r = &out.results[0];
        assert!(r.deltas.dscr_year1 < Decimal::ZERO);
        assert!(r.deltas.net_cash_flow_year1 < Decimal::ZERO);
        assert!(r.metrics.net_sale_proceeds < out.baseline.net_sale_proceeds);
    }

    #[test]
    fn test_apply_shocks() {
        let base = fourplex();
        let s = apply_shocks(
            &base,
            &[
                Shock::RentMultiplier(dec!(0.9)),
                Shock::VacancyAdd(dec!(0.05)),
                Shock::ExpenseMultiplier(dec!(1.5)),
                Shock::InterestRateAdd(dec!(-0.10)),
                Shock::ExitCapRateAdd(dec!(0.01)),
                Shock::ValueMultiplier(dec!(0.8)),
            ],
        )
        .unwrap();
        assert_eq!(s.gross_scheduled_rent, dec!(51840));
        assert_eq!(s.vacancy_rate, dec!(0.10));
        assert_eq!(s.expenses[1].annual_amount, dec!(3600));
        assert_eq!(s.financing.as_ref().unwrap().annual_rate, Decimal::ZERO);
        assert_eq!(s.exit.exit_cap_rate, Some(dec!(0.075)));
        assert_eq!(s.base_value, Some(dec!(320000)));
        // base untouched
        assert_eq!(base.gross_scheduled_rent, dec!(57600));
    }

    #[test]
    fn test_exit_cap_shock_on_appreciation_exit_warns() {
        let mut base = fourplex();
        base.exit.valuation = ExitValuation::Appreciation;
        base.exit.exit_cap_rate = None;
        let out = stress_test(&base, &[]).unwrap();

        let cap = out
            .result
            .results
            .iter()
            .find(|r| r.name == "+100 bps exit cap")
            .unwrap();
        assert_eq!(cap.deltas.total_profit, Decimal::ZERO);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("+100 bps exit cap") && w.contains("exit cap rate")));
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("combined downturn") && w.contains("exit cap rate")));
    }

    #[test]
    fn test_rate_shock_without_debt_warns() {
        let mut base = fourplex();
        base.financing = None;
        base.refinance = None;
        assert!(unused_shock_target(&base, &Shock::InterestRateAdd(dec!(0.02))).is_some());
        assert!(unused_shock_target(&base, &Shock::RentMultiplier(dec!(0.9))).is_none());
        assert!(unused_shock_target(&fourplex(), &Shock::InterestRateAdd(dec!(0.02))).is_none());
        assert!(unused_shock_target(&fourplex(), &Shock::ExitCapRateAdd(dec!(0.01))).is_none());
    }

    #[test]
    fn test_negative_multiplier_rejected() {
        assert!(apply_shocks(&fourplex(), &[Shock::RentMultiplier(dec!(-1))]).is_err());
    }

    #[test]
    fn test_shock_json_shape() {
        let json = serde_json::to_value(Shock::VacancyAdd(dec!(0.05))).unwrap();
        assert_eq!(json["kind"], "vacancy_add");
    }
}
