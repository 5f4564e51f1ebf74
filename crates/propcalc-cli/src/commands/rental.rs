use clap::Args;
use serde_json::Value;

use propcalc_core::analysis::rental;
use propcalc_core::projection::{self, ScenarioInputs};

use crate::input;

/// Arguments for the rental cash-flow analysis
#[derive(Args)]
pub struct RentalArgs {
    /// Path to JSON scenario file
    #[arg(long)]
    pub input: Option<String>,

    /// Print only the per-period projection table (no exit or IRR)
    #[arg(long)]
    pub projection_only: bool,
}

pub fn run_rental(args: RentalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario: ScenarioInputs = input::read_input(args.input.as_deref(), "rental analysis")?;

    if args.projection_only {
        let result = projection::project_cash_flows(&scenario)?;
        return Ok(serde_json::to_value(result)?);
    }
    let result = rental::analyze_rental(&scenario)?;
    Ok(serde_json::to_value(result)?)
}
