use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropCalcError;
use crate::projection::ScenarioInputs;
use crate::sensitivity::{evaluate_metric, Metric, SensitivityVariable};
use crate::types::{with_metadata, ComputationOutput};
use crate::PropCalcResult;

const MAX_SWEEP_POINTS: usize = 50;

/// Values swept for one axis, `min..=max` by `step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRange {
    pub variable: SensitivityVariable,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Two-way sensitivity table input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInput {
    pub scenario: ScenarioInputs,
    pub variable_1: SweepRange,
    pub variable_2: SweepRange,
    pub metric: Metric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridOutput {
    pub variable_1: SensitivityVariable,
    pub variable_2: SensitivityVariable,
    pub variable_1_values: Vec<Decimal>,
    pub variable_2_values: Vec<Decimal>,
    pub metric: Metric,
    /// matrix[i][j] = metric at variable_1_values[i], variable_2_values[j]
    pub matrix: Vec<Vec<Decimal>>,
    pub base_case_value: Decimal,
    /// Cell closest to the scenario's own values (row, col)
    pub base_case_position: (usize, usize),
}

fn sweep_values(range: &SweepRange) -> PropCalcResult<Vec<Decimal>> {
    let field = format!("{:?}", range.variable);
    if range.step <= Decimal::ZERO {
        return Err(PropCalcError::invalid(field, "Step must be positive"));
    }
    if range.min > range.max {
        return Err(PropCalcError::invalid(field, "Min must be <= max"));
    }

    let mut values = Vec::new();
    let mut current = range.min;
    while current <= range.max {
        values.push(current);
        if values.len() > MAX_SWEEP_POINTS {
            return Err(PropCalcError::invalid(
                field,
                format!("Sweep is limited to {MAX_SWEEP_POINTS} points"),
            ));
        }
        current += range.step;
    }
    if let Some(&last) = values.last() {
        if last < range.max {
            values.push(range.max);
        }
    }
    Ok(values)
}

fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Evaluate `metric` over the cross product of two sweeps. A cell whose
/// scenario fails to evaluate is recorded as zero with a warning.
pub fn sensitivity_grid(input: &GridInput) -> PropCalcResult<ComputationOutput<GridOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.variable_1.variable == input.variable_2.variable {
        return Err(PropCalcError::invalid(
            "variable_2",
            "The two axes must sweep different variables",
        ));
    }
    input.scenario.validate(&mut warnings)?;

    let v1_values = sweep_values(&input.variable_1)?;
    let v2_values = sweep_values(&input.variable_2)?;
    let var1 = input.variable_1.variable;
    let var2 = input.variable_2.variable;

    let mut matrix = Vec::with_capacity(v1_values.len());
    for v1 in &v1_values {
        let mut row = Vec::with_capacity(v2_values.len());
        for v2 in &v2_values {
            let cell = var1
                .perturbed(&input.scenario, *v1)
                .and_then(|s| var2.perturbed(&s, *v2))
                .and_then(|s| evaluate_metric(&s, input.metric));
            match cell {
                Ok(val) => row.push(val),
                Err(e) => {
                    warnings.push(format!("Evaluation failed at ({v1}, {v2}): {e}"));
                    row.push(Decimal::ZERO);
                }
            }
        }
        matrix.push(row);
    }

    let midpoint = |r: &SweepRange| (r.min + r.max) / dec!(2);
    let target1 = var1.get(&input.scenario).unwrap_or_else(|| midpoint(&input.variable_1));
    let target2 = var2.get(&input.scenario).unwrap_or_else(|| midpoint(&input.variable_2));
    let base_row = closest_index(&v1_values, target1);
    let base_col = closest_index(&v2_values, target2);
    let base_case_value = matrix[base_row][base_col];

    let output = GridOutput {
        variable_1: var1,
        variable_2: var2,
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        metric: input.metric,
        matrix,
        base_case_value,
        base_case_position: (base_row, base_col),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity Table",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::inputs::fixtures::fourplex;
    use rust_decimal_macros::dec;

    fn rent_by_rate() -> GridInput {
        GridInput {
            scenario: fourplex(),
            variable_1: SweepRange {
                variable: SensitivityVariable::GrossRent,
                min: dec!(50000),
                max: dec!(60000),
                step: dec!(2500),
            },
            variable_2: SweepRange {
                variable: SensitivityVariable::InterestRate,
                min: dec!(0.055),
                max: dec!(0.075),
                step: dec!(0.01),
            },
            metric: Metric::Dscr,
        }
    }

    #[test]
    fn test_grid_shape_and_monotonicity() {
        let out = sensitivity_grid(&rent_by_rate()).unwrap().result;
        assert_eq!(out.variable_1_values.len(), 5);
        assert_eq!(out.variable_2_values, vec![dec!(0.055), dec!(0.065), dec!(0.075)]);
        assert_eq!(out.matrix.len(), 5);
        // More rent, more coverage; higher rate, less coverage.
        assert!(out.matrix[4][0] > out.matrix[0][0]);
        assert!(out.matrix[0][2] < out.matrix[0][0]);
    }

    #[test]
    fn test_base_case_tracks_scenario() {
        let out = sensitivity_grid(&rent_by_rate()).unwrap().result;
        // rent 57600 -> 57500, rate 0.065 exact
        assert_eq!(out.base_case_position, (3, 1));
        assert_eq!(out.base_case_value, out.matrix[3][1]);
    }

    #[test]
    fn test_sweep_includes_max() {
        let values = sweep_values(&SweepRange {
            variable: SensitivityVariable::VacancyRate,
            min: dec!(0.02),
            max: dec!(0.10),
            step: dec!(0.03),
        })
        .unwrap();
        assert_eq!(values, vec![dec!(0.02), dec!(0.05), dec!(0.08), dec!(0.10)]);
    }

    #[test]
    fn test_same_variable_rejected() {
        let mut input = rent_by_rate();
        input.variable_2.variable = SensitivityVariable::GrossRent;
        assert!(sensitivity_grid(&input).is_err());
    }
}
