use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use propcalc_core::irr::{self, IrrSolution};
use propcalc_core::time_value;

use crate::input;

/// Arguments for IRR / NPV of a periodic cash-flow vector
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Periodic cash flows, outlay first (comma-separated, e.g. "-100,30,30,130")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Periods per year of the vector (12 for monthly flows)
    #[arg(long, default_value_t = 1)]
    pub periods_per_year: u32,

    /// Also discount the vector at this per-period rate
    #[arg(long)]
    pub discount_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct IrrInput {
    cash_flows: Vec<Decimal>,
    #[serde(default = "default_periods_per_year")]
    periods_per_year: u32,
    #[serde(default)]
    discount_rate: Option<Decimal>,
}

fn default_periods_per_year() -> u32 {
    1
}

#[derive(Debug, Serialize)]
struct IrrOutput {
    /// Per-period rate
    irr: Decimal,
    annualized_irr: Decimal,
    converged: bool,
    iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    npv: Option<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr_input: IrrInput = match input::read_optional(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => IrrInput {
            cash_flows: args
                .cash_flows
                .ok_or("--cash-flows is required (or provide --input)")?,
            periods_per_year: args.periods_per_year,
            discount_rate: args.discount_rate,
        },
    };

    if irr_input.periods_per_year == 0 {
        return Err("--periods-per-year must be at least 1".into());
    }
    let guess = time_value::periodic_rate(irr::INITIAL_GUESS, irr_input.periods_per_year);
    let IrrSolution {
        rate,
        converged,
        iterations,
    } = irr::solve_irr_with_guess(&irr_input.cash_flows, guess);
    if !converged {
        log::warn!("IRR did not converge after {iterations} iterations");
    }

    let npv = irr_input
        .discount_rate
        .map(|r| time_value::npv(r, &irr_input.cash_flows))
        .transpose()?;

    let output = IrrOutput {
        irr: rate,
        annualized_irr: time_value::annualize_periodic_rate(rate, irr_input.periods_per_year),
        converged,
        iterations,
        npv,
    };
    Ok(serde_json::json!({ "result": output }))
}
