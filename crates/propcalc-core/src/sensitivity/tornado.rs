use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropCalcError;
use crate::projection::ScenarioInputs;
use crate::sensitivity::{evaluate_metric, Metric, SensitivityVariable};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::PropCalcResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoInput {
    pub scenario: ScenarioInputs,
    pub metric: Metric,
    /// Relative swing applied both ways (0.10 = +/-10%)
    #[serde(default = "default_swing")]
    pub swing: Rate,
}

fn default_swing() -> Rate {
    dec!(0.10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoBar {
    pub variable: SensitivityVariable,
    pub low_input: Decimal,
    pub high_input: Decimal,
    pub low_value: Decimal,
    pub high_value: Decimal,
    /// |high_value - low_value|
    pub spread: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoOutput {
    pub metric: Metric,
    pub baseline: Decimal,
    /// Widest spread first
    pub bars: Vec<TornadoBar>,
}

/// One-at-a-time sensitivity: each variable moved by -/+ `swing` of its
/// current value with the rest held at baseline.
///
/// Variables the scenario does not use, or whose perturbed scenario fails
/// validation, are skipped with a warning.
pub fn tornado(
    inputs: &ScenarioInputs,
    metric: Metric,
    swing: Rate,
) -> PropCalcResult<ComputationOutput<TornadoOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if swing <= Decimal::ZERO || swing >= Decimal::ONE {
        return Err(PropCalcError::invalid("swing", "Swing must be in (0, 1)"));
    }
    inputs.validate(&mut warnings)?;
    let baseline = evaluate_metric(inputs, metric)?;

    let mut bars = Vec::new();
    for variable in SensitivityVariable::ALL {
        let Some(current) = variable.get(inputs) else {
            continue;
        };
        if current.is_zero() {
            warnings.push(format!("{variable:?} is zero; a relative swing has no effect"));
            continue;
        }
        let low_input = current * (Decimal::ONE - swing);
        let high_input = current * (Decimal::ONE + swing);

        let evaluate = |value: Decimal| -> PropCalcResult<Decimal> {
            evaluate_metric(&variable.perturbed(inputs, value)?, metric)
        };
        match (evaluate(low_input), evaluate(high_input)) {
            (Ok(low_value), Ok(high_value)) => bars.push(TornadoBar {
                variable,
                low_input,
                high_input,
                low_value,
                high_value,
                spread: (high_value - low_value).abs(),
            }),
            (Err(e), _) | (_, Err(e)) => {
                warnings.push(format!("{variable:?} skipped: {e}"));
            }
        }
    }

    bars.sort_by(|a, b| b.spread.cmp(&a.spread));

    let output = TornadoOutput {
        metric,
        baseline,
        bars,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Tornado (one-way sensitivity)",
        &serde_json::json!({
            "scenario": inputs,
            "metric": metric,
            "swing": swing,
        }),
        warnings,
        elapsed,
        output,
    ))
}
