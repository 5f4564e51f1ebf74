use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::DealQuality;
use crate::error::PropCalcError;
use crate::exit::valuation::{evaluate_exit, ExitProceeds};
use crate::irr::{solve_irr_with_guess, INITIAL_GUESS};
use crate::projection::{project_cash_flows, PeriodProjection, RefinanceEvent, ScenarioInputs};
use crate::time_value::{annualize_periodic_rate, periodic_rate};
use crate::types::{safe_div, with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::PropCalcResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Headline numbers of one pipeline run. This is what sensitivity and
/// stress runs compare against each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    /// Annualised levered IRR on the equity vector
    pub irr: Rate,
    pub irr_converged: bool,
    pub cash_on_cash_year1: Rate,
    /// Year-1 NOI / year-1 debt service; zero when unlevered
    pub dscr_year1: Decimal,
    pub net_cash_flow_year1: Money,
    pub equity_multiple: Multiple,
    pub total_profit: Money,
    pub net_sale_proceeds: Money,
}

/// Full results object for the rental calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalAnalysis {
    pub projection: Vec<PeriodProjection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinance: Option<RefinanceEvent>,
    pub exit: ExitProceeds,
    /// Equity vector fed to the IRR solver (index 0 = initial investment)
    pub cash_flow_vector: Vec<Money>,
    pub irr: Rate,
    pub irr_converged: bool,
    pub equity_multiple: Multiple,
    pub going_in_cap_rate: Rate,
    pub cash_on_cash_year1: Rate,
    pub dscr_year1: Decimal,
    pub monthly_cash_flow_year1: Money,
    pub total_cash_invested: Money,
    pub loan_amount: Money,
    pub total_profit: Money,
    pub roi: Rate,
    pub deal_quality: DealQuality,
}

pub(crate) struct PipelineRun {
    pub(crate) projection: Vec<PeriodProjection>,
    pub(crate) refinance: Option<RefinanceEvent>,
    pub(crate) exit: ExitProceeds,
    pub(crate) vector: Vec<Money>,
    pub(crate) metrics: ScenarioMetrics,
    pub(crate) noi_year1: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Equity cash-flow vector for IRR.
///
/// Exit proceeds are merged into the final period's operating cash flow:
/// the sale is modelled as happening instantaneously at the end of the last
/// period rather than as a separate trailing period.
pub fn build_cash_flow_vector(
    initial_investment: Money,
    projection: &[PeriodProjection],
    net_sale_proceeds: Money,
) -> Vec<Money> {
    let mut vector = Vec::with_capacity(projection.len() + 1);
    vector.push(-initial_investment);
    vector.extend(projection.iter().map(|p| p.net_cash_flow));
    if !projection.is_empty() {
        if let Some(last) = vector.last_mut() {
            *last += net_sale_proceeds;
        }
    }
    vector
}

/// Projection + exit + IRR, returning only the headline metrics.
pub fn compute_metrics(inputs: &ScenarioInputs) -> PropCalcResult<ScenarioMetrics> {
    Ok(run_pipeline(inputs)?.metrics)
}

/// Run the full rental pipeline and wrap the results table and summary
/// scalars in the standard envelope.
pub fn analyze_rental(
    inputs: &ScenarioInputs,
) -> PropCalcResult<ComputationOutput<RentalAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    inputs.validate(&mut warnings)?;
    let run = run_pipeline(inputs)?;
    let m = &run.metrics;

    let total_cash_invested = inputs.initial_investment();
    let loan_amount = inputs.loan_amount();
    let going_in_cap_rate = safe_div(run.noi_year1, inputs.purchase_price);
    let has_debt = loan_amount > Decimal::ZERO;

    if has_debt && m.dscr_year1 < dec!(1.2) {
        warnings.push(format!(
            "DSCR of {:.2} is below 1.20x; lender covenant risk",
            m.dscr_year1
        ));
    }
    if let Some(f) = &inputs.financing {
        if f.ltv > dec!(0.80) {
            warnings.push(format!(
                "LTV of {:.1}% exceeds 80%; expect mortgage insurance or tighter terms",
                f.ltv * dec!(100)
            ));
        }
    }
    if !m.irr_converged {
        warnings.push("IRR did not converge; reported rate is a best-effort estimate".into());
    }
    if m.net_cash_flow_year1 < Decimal::ZERO {
        warnings.push("Year-1 cash flow is negative".into());
    }
    if total_cash_invested <= Decimal::ZERO {
        warnings.push("No cash invested; ROI and cash-on-cash are reported as zero".into());
    }

    let output = RentalAnalysis {
        exit: run.exit.clone(),
        cash_flow_vector: run.vector.clone(),
        irr: m.irr,
        irr_converged: m.irr_converged,
        equity_multiple: m.equity_multiple,
        going_in_cap_rate,
        cash_on_cash_year1: m.cash_on_cash_year1,
        dscr_year1: m.dscr_year1,
        monthly_cash_flow_year1: m.net_cash_flow_year1 / dec!(12),
        total_cash_invested,
        loan_amount,
        total_profit: m.total_profit,
        roi: safe_div(m.total_profit, total_cash_invested),
        deal_quality: DealQuality::for_rental(m.cash_on_cash_year1, m.dscr_year1, has_debt),
        projection: run.projection,
        refinance: run.refinance,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rental Cash-Flow Projection with Exit and Levered IRR",
        inputs,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub(crate) fn run_pipeline(inputs: &ScenarioInputs) -> PropCalcResult<PipelineRun> {
    if inputs.horizon == 0 {
        return Err(PropCalcError::invalid(
            "horizon",
            "At least one period is needed to evaluate an exit",
        ));
    }

    let projection = project_cash_flows(inputs)?;
    let rows = projection.periods;
    let exit = evaluate_exit(inputs, &rows)?;

    let initial_investment = inputs.initial_investment();
    let vector = build_cash_flow_vector(initial_investment, &rows, exit.net_proceeds);
    let ppy = inputs.periods_per_year();
    let solution = solve_irr_with_guess(&vector, periodic_rate(INITIAL_GUESS, ppy));
    let irr = annualize_periodic_rate(solution.rate, ppy);

    let first_year: Vec<&PeriodProjection> = rows.iter().filter(|p| p.year == 1).collect();
    let noi_year1: Money = first_year.iter().map(|p| p.noi).sum();
    let debt_service_year1: Money = first_year.iter().map(|p| p.debt_service).sum();
    let net_cash_flow_year1: Money = first_year.iter().map(|p| p.net_cash_flow).sum();

    let operating_total: Money = rows.iter().map(|p| p.net_cash_flow).sum();
    let total_returned = operating_total + exit.net_proceeds;

    let metrics = ScenarioMetrics {
        irr,
        irr_converged: solution.converged,
        cash_on_cash_year1: safe_div(net_cash_flow_year1, initial_investment),
        dscr_year1: safe_div(noi_year1, debt_service_year1),
        net_cash_flow_year1,
        equity_multiple: safe_div(total_returned, initial_investment),
        total_profit: total_returned - initial_investment,
        net_sale_proceeds: exit.net_proceeds,
    };

    Ok(PipelineRun {
        projection: rows,
        refinance: projection.refinance,
        exit,
        vector,
        metrics,
        noi_year1,
    })
}
