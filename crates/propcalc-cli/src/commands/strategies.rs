use clap::Args;
use serde_json::Value;

use propcalc_core::exit::strategies::{self, PropertyDeal};

use crate::input;

/// Arguments for the exit-strategy comparison
#[derive(Args)]
pub struct ExitStrategiesArgs {
    /// Path to JSON deal file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the deal's timeline ceiling in months
    #[arg(long)]
    pub max_months: Option<u32>,
}

pub fn run_exit_strategies(args: ExitStrategiesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut deal: PropertyDeal = input::read_input(args.input.as_deref(), "exit strategies")?;
    if let Some(months) = args.max_months {
        deal.max_timeline_months = months;
    }
    let result = strategies::compare_exit_strategies(&deal)?;
    Ok(serde_json::to_value(result)?)
}
