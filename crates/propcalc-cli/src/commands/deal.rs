use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use propcalc_core::analysis::deal::{self, MaoInput};

use crate::input;

/// Arguments for the maximum-allowable-offer screen
#[derive(Args)]
pub struct MaoArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// After-repair value
    #[arg(long)]
    pub arv: Option<Decimal>,

    /// Estimated repair costs
    #[arg(long)]
    pub repairs: Option<Decimal>,

    /// Asking or contract price
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Share of ARV paid before repairs
    #[arg(long, default_value_t = dec!(0.70))]
    pub market_rule: Decimal,

    /// Carrying costs over the project
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub holding_costs: Decimal,

    /// Buy-side closing costs
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub closing_costs: Decimal,

    /// Sell-side costs as a fraction of ARV
    #[arg(long, default_value_t = dec!(0.06))]
    pub selling_cost_rate: Decimal,
}

pub fn run_mao(args: MaoArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mao_input: MaoInput = match input::read_optional(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => MaoInput {
            arv: args.arv.ok_or("--arv is required (or provide --input)")?,
            repair_costs: args.repairs.ok_or("--repairs is required (or provide --input)")?,
            market_rule: args.market_rule,
            purchase_price: args.price.ok_or("--price is required (or provide --input)")?,
            holding_costs: args.holding_costs,
            closing_costs: args.closing_costs,
            selling_cost_rate: args.selling_cost_rate,
        },
    };

    let result = deal::evaluate_mao(&mao_input)?;
    Ok(serde_json::to_value(result)?)
}
