use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropCalcError;
use crate::projection::ScenarioInputs;
use crate::sensitivity::{evaluate_metric, Metric, SensitivityVariable};
use crate::types::{with_metadata, ComputationOutput};
use crate::PropCalcResult;

const SCAN_STEPS: u32 = 20;
const MAX_BISECTIONS: u32 = 60;
const VALUE_TOLERANCE: Decimal = dec!(0.0000001);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenInput {
    pub scenario: ScenarioInputs,
    pub variable: SensitivityVariable,
    pub metric: Metric,
    /// Metric level to solve for (e.g. DSCR 1.0, IRR 0)
    pub threshold: Decimal,
    /// Search range for the variable
    pub low: Decimal,
    pub high: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenResult {
    pub variable: SensitivityVariable,
    pub metric: Metric,
    pub threshold: Decimal,
    /// Variable value at which the metric crosses the threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_even_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_value: Option<Decimal>,
    pub baseline_metric: Decimal,
    /// Relative move from baseline to break-even: (break_even - base) / base
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_of_safety: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value of `variable` within `[low, high]` at which `metric` equals
/// `threshold`, every other input held fixed.
///
/// A linear scan brackets the first crossing, then bisection narrows it.
/// `Ok(None)` when the metric never crosses the threshold inside the range.
pub fn break_even(
    inputs: &ScenarioInputs,
    variable: SensitivityVariable,
    metric: Metric,
    threshold: Decimal,
    low: Decimal,
    high: Decimal,
) -> PropCalcResult<Option<Decimal>> {
    if low >= high {
        return Err(PropCalcError::invalid("low", "Search range must satisfy low < high"));
    }

    let gap = |value: Decimal| -> PropCalcResult<Decimal> {
        let scenario = variable.perturbed(inputs, value)?;
        Ok(evaluate_metric(&scenario, metric)? - threshold)
    };

    // --- Bracket ---
    let step = (high - low) / Decimal::from(SCAN_STEPS);
    let mut lo = low;
    let mut gap_lo = gap(lo)?;
    if gap_lo.is_zero() {
        return Ok(Some(lo));
    }
    let mut bracket = None;
    for i in 1..=SCAN_STEPS {
        let hi = if i == SCAN_STEPS { high } else { low + step * Decimal::from(i) };
        let gap_hi = gap(hi)?;
        if gap_hi.is_zero() {
            return Ok(Some(hi));
        }
        if gap_lo.is_sign_negative() != gap_hi.is_sign_negative() {
            bracket = Some((lo, hi, gap_lo));
            break;
        }
        lo = hi;
        gap_lo = gap_hi;
    }
    let Some((mut lo, mut hi, mut gap_lo)) = bracket else {
        debug!("break-even: {metric:?} never reaches {threshold} over {variable:?} in [{low}, {high}]");
        return Ok(None);
    };

    // --- Bisect ---
    let tolerance = VALUE_TOLERANCE * Decimal::ONE.max(high.abs().max(low.abs()));
    for _ in 0..MAX_BISECTIONS {
        let mid = (lo + hi) / dec!(2);
        let gap_mid = gap(mid)?;
        if gap_mid.is_zero() || hi - lo < tolerance {
            return Ok(Some(mid));
        }
        if gap_mid.is_sign_negative() == gap_lo.is_sign_negative() {
            lo = mid;
            gap_lo = gap_mid;
        } else {
            hi = mid;
        }
    }

    Err(PropCalcError::ConvergenceFailure {
        function: "break_even".into(),
        iterations: MAX_BISECTIONS,
        last_delta: hi - lo,
    })
}

/// [`break_even`] with the baseline and margin of safety, in the standard
/// envelope.
pub fn analyze_break_even(
    input: &BreakEvenInput,
) -> PropCalcResult<ComputationOutput<BreakEvenResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.scenario.validate(&mut warnings)?;
    let baseline_value = input.variable.get(&input.scenario);
    let baseline_metric = evaluate_metric(&input.scenario, input.metric)?;

    let break_even_value = break_even(
        &input.scenario,
        input.variable,
        input.metric,
        input.threshold,
        input.low,
        input.high,
    )?;

    if break_even_value.is_none() {
        warnings.push(format!(
            "{:?} does not cross {} anywhere in [{}, {}]",
            input.metric, input.threshold, input.low, input.high
        ));
    }

    let margin_of_safety = match (break_even_value, baseline_value) {
        (Some(be), Some(base)) if !base.is_zero() => Some((be - base) / base),
        _ => None,
    };

    let output = BreakEvenResult {
        variable: input.variable,
        metric: input.metric,
        threshold: input.threshold,
        break_even_value,
        baseline_value,
        baseline_metric,
        margin_of_safety,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Break-Even Search (linear bracket + bisection)",
        input,
        warnings,
        elapsed,
        output,
    ))
}
