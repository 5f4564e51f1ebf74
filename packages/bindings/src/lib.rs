use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use propcalc_core::PropCalcResult;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse `input_json`, run `calc`, and serialise its output.
fn json_call<I, O>(input_json: &str, calc: impl FnOnce(&I) -> PropCalcResult<O>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = calc(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Rental projection
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_rental(input_json: String) -> NapiResult<String> {
    json_call(&input_json, propcalc_core::analysis::rental::analyze_rental)
}

#[napi]
pub fn project_cash_flows(input_json: String) -> NapiResult<String> {
    json_call(&input_json, propcalc_core::projection::project_cash_flows)
}

// ---------------------------------------------------------------------------
// Financing and returns
// ---------------------------------------------------------------------------

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    json_call(&input_json, propcalc_core::amortization::amortization_schedule)
}

/// `{"cash_flows": [...]}` in, `{"rate", "converged", "iterations"}` out.
#[napi]
pub fn solve_irr(input_json: String) -> NapiResult<String> {
    #[derive(serde::Deserialize)]
    struct IrrInput {
        cash_flows: Vec<rust_decimal::Decimal>,
    }
    json_call(&input_json, |input: &IrrInput| {
        Ok(propcalc_core::irr::solve_irr(&input.cash_flows))
    })
}

// ---------------------------------------------------------------------------
// Deal screening and exits
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_mao(input_json: String) -> NapiResult<String> {
    json_call(&input_json, propcalc_core::analysis::deal::evaluate_mao)
}

#[napi]
pub fn compare_exit_strategies(input_json: String) -> NapiResult<String> {
    json_call(
        &input_json,
        propcalc_core::exit::strategies::compare_exit_strategies,
    )
}

#[napi]
pub fn schedule_development(input_json: String) -> NapiResult<String> {
    json_call(
        &input_json,
        propcalc_core::development::schedule_development,
    )
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

#[napi]
pub fn break_even(input_json: String) -> NapiResult<String> {
    json_call(&input_json, propcalc_core::sensitivity::analyze_break_even)
}

#[napi]
pub fn stress_test(input_json: String) -> NapiResult<String> {
    json_call(
        &input_json,
        |input: &propcalc_core::sensitivity::StressTestInput| {
            propcalc_core::sensitivity::stress_test(&input.scenario, &input.scenarios)
        },
    )
}

#[napi]
pub fn tornado(input_json: String) -> NapiResult<String> {
    json_call(
        &input_json,
        |input: &propcalc_core::sensitivity::TornadoInput| {
            propcalc_core::sensitivity::tornado(&input.scenario, input.metric, input.swing)
        },
    )
}

#[napi]
pub fn sensitivity_grid(input_json: String) -> NapiResult<String> {
    json_call(&input_json, propcalc_core::sensitivity::sensitivity_grid)
}
