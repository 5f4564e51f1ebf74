use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::DealQuality;
use crate::error::PropCalcError;
use crate::types::{safe_div, with_metadata, ComputationOutput, Money, Rate};
use crate::PropCalcResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Maximum-allowable-offer screen for a fix-and-flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaoInput {
    /// After-repair value
    pub arv: Money,
    pub repair_costs: Money,
    /// Share of ARV an investor will pay before repairs (the "70% rule")
    #[serde(default = "default_market_rule")]
    pub market_rule: Rate,
    /// Asking or contract price being screened
    pub purchase_price: Money,
    /// Total carrying costs over the project (interest, taxes, utilities)
    #[serde(default)]
    pub holding_costs: Money,
    /// Buy-side closing costs
    #[serde(default)]
    pub closing_costs: Money,
    /// Sell-side costs as a fraction of ARV
    #[serde(default = "default_selling_cost_rate")]
    pub selling_cost_rate: Rate,
}

fn default_market_rule() -> Rate {
    dec!(0.70)
}

fn default_selling_cost_rate() -> Rate {
    dec!(0.06)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaoOutput {
    pub mao: Money,
    pub passes_mao: bool,
    /// purchase_price / MAO; zero when MAO is not positive
    pub price_to_mao_ratio: Decimal,
    /// MAO - purchase price (negative when overpaying)
    pub spread: Money,
    pub deal_quality: DealQuality,
    pub total_project_cost: Money,
    pub projected_profit: Money,
    pub projected_roi: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// MAO = ARV x market rule - repair costs, plus the projected flip outcome
/// at the screened price.
pub fn evaluate_mao(input: &MaoInput) -> PropCalcResult<ComputationOutput<MaoOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input, &mut warnings)?;

    let mao = input.arv * input.market_rule - input.repair_costs;
    let passes_mao = input.purchase_price <= mao;
    let price_to_mao_ratio = if mao > Decimal::ZERO {
        input.purchase_price / mao
    } else {
        warnings.push("Repairs exceed the market-rule value; MAO is not positive".into());
        Decimal::ZERO
    };
    let deal_quality = if mao > Decimal::ZERO {
        DealQuality::for_price_to_mao(price_to_mao_ratio)
    } else {
        DealQuality::Poor
    };

    let total_project_cost =
        input.purchase_price + input.repair_costs + input.holding_costs + input.closing_costs;
    let selling_costs = input.arv * input.selling_cost_rate;
    let projected_profit = input.arv - selling_costs - total_project_cost;
    let projected_roi = safe_div(projected_profit, total_project_cost);

    if !passes_mao {
        warnings.push(format!(
            "Purchase price exceeds MAO by {}",
            (input.purchase_price - mao).round_dp(2)
        ));
    }
    if projected_profit < Decimal::ZERO {
        warnings.push("Projected flip profit is negative".into());
    }

    let output = MaoOutput {
        mao,
        passes_mao,
        price_to_mao_ratio,
        spread: mao - input.purchase_price,
        deal_quality,
        total_project_cost,
        projected_profit,
        projected_roi,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Maximum Allowable Offer (ARV x market rule - repairs)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate_input(input: &MaoInput, warnings: &mut Vec<String>) -> PropCalcResult<()> {
    if input.arv < Decimal::ZERO {
        return Err(PropCalcError::invalid("arv", "After-repair value cannot be negative"));
    }
    for (field, value) in [
        ("repair_costs", input.repair_costs),
        ("purchase_price", input.purchase_price),
        ("holding_costs", input.holding_costs),
        ("closing_costs", input.closing_costs),
    ] {
        if value < Decimal::ZERO {
            return Err(PropCalcError::invalid(field, "Must be non-negative"));
        }
    }
    if input.market_rule <= Decimal::ZERO || input.market_rule > Decimal::ONE {
        return Err(PropCalcError::invalid("market_rule", "Must be in (0, 1]"));
    }
    if input.selling_cost_rate < Decimal::ZERO || input.selling_cost_rate >= Decimal::ONE {
        return Err(PropCalcError::invalid("selling_cost_rate", "Must be in [0, 1)"));
    }
    if input.market_rule > dec!(0.80) {
        warnings.push(format!(
            "Market rule of {} leaves little margin for holding and selling costs",
            input.market_rule
        ));
    }
    Ok(())
}
