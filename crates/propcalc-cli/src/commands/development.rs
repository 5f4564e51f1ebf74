use clap::Args;
use serde_json::Value;

use propcalc_core::development::{self, DevelopmentInput};

use crate::input;

/// Arguments for a phased development schedule
#[derive(Args)]
pub struct DevelopArgs {
    /// Path to JSON project file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_develop(args: DevelopArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let project: DevelopmentInput =
        input::read_input(args.input.as_deref(), "development schedule")?;
    let result = development::schedule_development(&project)?;
    Ok(serde_json::to_value(result)?)
}
