use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use propcalc_core::amortization::{self, AmortizationInput};

use crate::input;

/// Arguments for a loan amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate (e.g. 0.065)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Amortization term in years
    #[arg(long, default_value_t = 30)]
    pub term_years: u32,

    /// Drop the month-by-month rows and keep the totals
    #[arg(long)]
    pub summary: bool,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan: AmortizationInput = match input::read_optional(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => AmortizationInput {
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            term_years: args.term_years,
        },
    };

    let mut result = amortization::amortization_schedule(&loan)?;
    if args.summary {
        result.result.periods.clear();
    }
    Ok(serde_json::to_value(result)?)
}
