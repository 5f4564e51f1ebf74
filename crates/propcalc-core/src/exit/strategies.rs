use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::rental::{build_cash_flow_vector, run_pipeline};
use crate::error::PropCalcError;
use crate::exit::valuation::{ExitAssumptions, ExitProceeds, ExitValuation};
use crate::irr::{solve_irr, solve_irr_with_guess, IrrSolution, INITIAL_GUESS};
use crate::projection::{
    ExpenseLineItem, FinancingTerms, GrowthAssumptions, PeriodProjection, ScenarioInputs,
};
use crate::time_value::{annualize_periodic_rate, growth_factor, periodic_rate};
use crate::types::{safe_div, with_metadata, ComputationOutput, Money, PeriodFrequency, Rate};
use crate::PropCalcResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Flip,
    Hold,
    Brrrr,
    Subdivide,
    Hybrid,
    Wholesale,
}

/// Short-term (hard-money) acquisition loan. Interest only, repaid at sale
/// or refinance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionLoan {
    /// Loan-to-purchase-price
    pub ltv: Rate,
    pub annual_rate: Rate,
    /// Origination points as a fraction of the loan
    #[serde(default)]
    pub points: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipParams {
    /// Months on market after the rehab completes
    #[serde(default = "default_sale_months")]
    pub sale_months: u32,
}

fn default_sale_months() -> u32 {
    3
}

/// Stabilised rental operations shared by the hold-type strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalOperations {
    pub monthly_rent: Money,
    #[serde(default = "default_vacancy_rate")]
    pub vacancy_rate: Rate,
    /// Taxes, insurance, repairs, utilities (excluding management)
    pub monthly_operating_expenses: Money,
    #[serde(default)]
    pub management_fee_rate: Rate,
    #[serde(default)]
    pub rent_growth: Rate,
    #[serde(default)]
    pub expense_growth: Rate,
    #[serde(default)]
    pub appreciation_rate: Rate,
    pub hold_years: u32,
}

fn default_vacancy_rate() -> Rate {
    dec!(0.05)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldParams {
    #[serde(flatten)]
    pub operations: RentalOperations,
    /// Long-term financing against the purchase price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingTerms>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrrrrParams {
    #[serde(flatten)]
    pub operations: RentalOperations,
    /// Refinance loan-to-ARV
    pub refinance_ltv: Rate,
    pub refinance_rate: Rate,
    #[serde(default = "default_refinance_term")]
    pub refinance_term_years: u32,
    /// Refinance closing costs as a fraction of the new loan
    #[serde(default = "default_refinance_cost_rate")]
    pub refinance_cost_rate: Rate,
}

fn default_refinance_term() -> u32 {
    30
}

fn default_refinance_cost_rate() -> Rate {
    dec!(0.02)
}

/// One unit type produced by splitting the property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitType {
    pub name: String,
    pub count: u32,
    /// Comparable sale price of a unit of this type
    pub base_price: Money,
    /// Uplift for a newly converted unit (0.05 = 5% above comps)
    #[serde(default)]
    pub conversion_premium: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdivideParams {
    pub unit_types: Vec<UnitType>,
    /// Survey, legal, permits and title work for the split
    #[serde(default)]
    pub subdivision_costs: Money,
    #[serde(default)]
    pub conversion_cost_per_unit: Money,
    /// Fixed selling cost per unit on top of the percentage
    #[serde(default)]
    pub per_unit_selling_cost: Money,
    /// Months to sell all units after the rehab completes
    pub months_to_sell: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridParams {
    /// Share of the subdivided units that are sold; the rest are rented
    pub sell_fraction: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WholesaleParams {
    pub assignment_fee: Money,
    #[serde(default)]
    pub marketing_costs: Money,
    /// Deposit at risk until the assignment closes; refunded at close
    #[serde(default)]
    pub earnest_money: Money,
    #[serde(default = "default_wholesale_months")]
    pub months: u32,
}

fn default_wholesale_months() -> u32 {
    1
}

/// A single property evaluated under every strategy whose parameters are
/// supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDeal {
    #[serde(default)]
    pub property_name: String,
    pub purchase_price: Money,
    #[serde(default)]
    pub closing_costs: Money,
    #[serde(default)]
    pub rehab_costs: Money,
    #[serde(default)]
    pub rehab_months: u32,
    /// After-repair value
    pub arv: Money,
    /// Taxes, insurance and utilities while the property is not producing
    #[serde(default)]
    pub monthly_holding_costs: Money,
    #[serde(default = "default_selling_cost_rate")]
    pub selling_cost_rate: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_loan: Option<AcquisitionLoan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip: Option<FlipParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold: Option<HoldParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brrrr: Option<BrrrrParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivide: Option<SubdivideParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<HybridParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wholesale: Option<WholesaleParams>,
    /// Strategies taking longer than this are never recommended
    #[serde(default = "default_max_timeline_months")]
    pub max_timeline_months: u32,
}

fn default_selling_cost_rate() -> Rate {
    dec!(0.06)
}

fn default_max_timeline_months() -> u32 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSale {
    pub name: String,
    pub count: u32,
    pub unit_price: Money,
    pub gross_proceeds: Money,
}

/// Strategy-specific intermediates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyDetails {
    Flip {
        loan_amount: Money,
        interest_cost: Money,
        points_cost: Money,
        holding_costs: Money,
        selling_costs: Money,
    },
    Hold {
        monthly_cash_flow_year1: Money,
        equity_multiple: Decimal,
        exit: ExitProceeds,
    },
    Brrrr {
        cash_invested_before_refinance: Money,
        refinance_loan: Money,
        refinance_costs: Money,
        cash_out: Money,
        cash_left_in_deal: Money,
        monthly_cash_flow_year1: Money,
        exit: ExitProceeds,
    },
    Subdivide {
        units: Vec<UnitSale>,
        total_units: u32,
        selling_costs: Money,
    },
    Hybrid {
        units_sold: u32,
        units_retained: u32,
        net_sale_proceeds: Money,
        monthly_cash_flow_year1: Money,
        exit: ExitProceeds,
    },
    Wholesale {
        assignment_fee: Money,
        earnest_money: Money,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitStrategyResult {
    pub strategy: StrategyKind,
    /// Equity committed to the strategy
    pub total_investment: Money,
    pub gross_revenue: Money,
    /// Every outflow, loan payoff excluded
    pub total_costs: Money,
    pub net_profit: Money,
    pub roi: Rate,
    pub annualized_roi: Rate,
    pub irr: Rate,
    pub irr_converged: bool,
    pub timeline_months: u32,
    pub details: StrategyDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitStrategyComparison {
    /// Sorted by ROI, best first
    pub strategies: Vec<ExitStrategyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<StrategyKind>,
    /// Strategies whose timeline exceeds the ceiling
    pub excluded_by_timeline: Vec<StrategyKind>,
    pub max_timeline_months: u32,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate every configured strategy for `deal`, rank by ROI and pick the
/// best one that finishes within the timeline ceiling.
pub fn compare_exit_strategies(
    deal: &PropertyDeal,
) -> PropCalcResult<ComputationOutput<ExitStrategyComparison>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_deal(deal)?;

    let mut results = Vec::new();
    if let Some(p) = &deal.flip {
        results.push(evaluate_flip(deal, p));
    }
    if let Some(p) = &deal.hold {
        results.push(evaluate_hold(deal, p)?);
    }
    if let Some(p) = &deal.brrrr {
        results.push(evaluate_brrrr(deal, p, &mut warnings)?);
    }
    if let Some(p) = &deal.subdivide {
        results.push(evaluate_subdivide(deal, p));
    }
    if let Some(p) = &deal.hybrid {
        match (&deal.subdivide, &deal.hold) {
            (Some(sub), Some(hold)) => results.push(evaluate_hybrid(deal, p, sub, hold)?),
            _ => warnings.push(
                "Hybrid strategy skipped: it needs both subdivide and hold parameters".into(),
            ),
        }
    }
    if let Some(p) = &deal.wholesale {
        results.push(evaluate_wholesale(p));
    }

    if results.is_empty() {
        return Err(PropCalcError::InsufficientData(
            "No strategy parameters supplied".into(),
        ));
    }

    for r in &results {
        if !r.irr_converged {
            warnings.push(format!("{:?}: IRR did not converge", r.strategy));
        }
        if r.net_profit < Decimal::ZERO {
            warnings.push(format!("{:?} loses money at these assumptions", r.strategy));
        }
    }

    let recommended = rank_strategies(&mut results, deal.max_timeline_months);
    if recommended.is_none() {
        warnings.push(format!(
            "No strategy completes within {} months; nothing recommended",
            deal.max_timeline_months
        ));
    }
    let excluded_by_timeline = results
        .iter()
        .filter(|r| r.timeline_months > deal.max_timeline_months)
        .map(|r| r.strategy)
        .collect();

    let output = ExitStrategyComparison {
        strategies: results,
        recommended,
        excluded_by_timeline,
        max_timeline_months: deal.max_timeline_months,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Exit Strategy Comparison (ROI ranking with timeline ceiling)",
        deal,
        warnings,
        elapsed,
        output,
    ))
}

/// Sort by ROI descending and return the best strategy whose timeline fits
/// under `max_timeline_months`.
pub fn rank_strategies(
    results: &mut [ExitStrategyResult],
    max_timeline_months: u32,
) -> Option<StrategyKind> {
    results.sort_by(|a, b| b.roi.cmp(&a.roi));
    results
        .iter()
        .find(|r| r.timeline_months <= max_timeline_months)
        .map(|r| r.strategy)
}

/// ROI compounded to a 12-month basis.
pub fn annualized_roi(roi: Rate, months: u32) -> Rate {
    if months == 0 {
        return roi;
    }
    if roi <= dec!(-1) {
        return dec!(-1);
    }
    growth_factor(roi, Decimal::from(12) / Decimal::from(months)) - Decimal::ONE
}

// ---------------------------------------------------------------------------
// Short-term strategies (monthly cash flows)
// ---------------------------------------------------------------------------

/// Month-0 outlay, costs spread over the first `spread_months`, a flat
/// monthly carry, and one inflow in the final month.
struct ShortTermPlan {
    upfront: Money,
    spread: Money,
    spread_months: u32,
    monthly_carry: Money,
    months: u32,
    final_inflow: Money,
}

impl ShortTermPlan {
    fn months(&self) -> u32 {
        self.months.max(1)
    }

    fn cash_flows(&self) -> Vec<Money> {
        let months = self.months();
        let spread_months = self.spread_months.clamp(1, months);
        let per_month_spread = self.spread / Decimal::from(spread_months);

        let mut flows = Vec::with_capacity(months as usize + 1);
        flows.push(-self.upfront);
        for m in 1..=months {
            let mut cf = -self.monthly_carry;
            if m <= spread_months {
                cf -= per_month_spread;
            }
            if m == months {
                cf += self.final_inflow;
            }
            flows.push(cf);
        }
        flows
    }

    fn cash_invested(&self) -> Money {
        self.upfront + self.spread + self.monthly_carry * Decimal::from(self.months())
    }

    fn irr(&self) -> IrrSolution {
        let monthly = solve_irr_with_guess(&self.cash_flows(), periodic_rate(INITIAL_GUESS, 12));
        IrrSolution {
            rate: annualize_periodic_rate(monthly.rate, 12),
            ..monthly
        }
    }
}

/// Amount, points and monthly interest of the acquisition loan.
fn acquisition_terms(deal: &PropertyDeal) -> (Money, Money, Money) {
    match &deal.acquisition_loan {
        Some(l) => {
            let amount = deal.purchase_price * l.ltv;
            (amount, amount * l.points, amount * l.annual_rate / dec!(12))
        }
        None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
    }
}

fn short_term_result(
    strategy: StrategyKind,
    plan: &ShortTermPlan,
    gross_revenue: Money,
    total_costs: Money,
    details: StrategyDetails,
) -> ExitStrategyResult {
    let total_investment = plan.cash_invested();
    let net_profit = gross_revenue - total_costs;
    let roi = safe_div(net_profit, total_investment);
    let solution = plan.irr();
    ExitStrategyResult {
        strategy,
        total_investment,
        gross_revenue,
        total_costs,
        net_profit,
        roi,
        annualized_roi: annualized_roi(roi, plan.months()),
        irr: solution.rate,
        irr_converged: solution.converged,
        timeline_months: plan.months(),
        details,
    }
}

fn evaluate_flip(deal: &PropertyDeal, params: &FlipParams) -> ExitStrategyResult {
    let months = deal.rehab_months.saturating_add(params.sale_months);
    let (loan_amount, points_cost, monthly_interest) = acquisition_terms(deal);
    let selling_costs = deal.arv * deal.selling_cost_rate;

    let plan = ShortTermPlan {
        upfront: deal.purchase_price + deal.closing_costs + points_cost - loan_amount,
        spread: deal.rehab_costs,
        spread_months: deal.rehab_months,
        monthly_carry: deal.monthly_holding_costs + monthly_interest,
        months,
        final_inflow: deal.arv - selling_costs - loan_amount,
    };

    let holding_costs = deal.monthly_holding_costs * Decimal::from(plan.months());
    let interest_cost = monthly_interest * Decimal::from(plan.months());
    let total_costs = deal.purchase_price
        + deal.closing_costs
        + deal.rehab_costs
        + holding_costs
        + interest_cost
        + points_cost
        + selling_costs;

    short_term_result(
        StrategyKind::Flip,
        &plan,
        deal.arv,
        total_costs,
        StrategyDetails::Flip {
            loan_amount,
            interest_cost,
            points_cost,
            holding_costs,
            selling_costs,
        },
    )
}

/// Each unit type priced at `base * (1 + premium)`.
fn unit_sales(params: &SubdivideParams) -> Vec<UnitSale> {
    params
        .unit_types
        .iter()
        .map(|u| {
            let unit_price = u.base_price * (Decimal::ONE + u.conversion_premium);
            UnitSale {
                name: u.name.clone(),
                count: u.count,
                unit_price,
                gross_proceeds: unit_price * Decimal::from(u.count),
            }
        })
        .collect()
}

fn total_units(params: &SubdivideParams) -> u32 {
    params.unit_types.iter().map(|u| u.count).sum()
}

/// Rehab, split and conversion costs incurred before units can sell.
fn subdivision_spend(deal: &PropertyDeal, params: &SubdivideParams) -> Money {
    deal.rehab_costs
        + params.subdivision_costs
        + params.conversion_cost_per_unit * Decimal::from(total_units(params))
}

fn evaluate_subdivide(deal: &PropertyDeal, params: &SubdivideParams) -> ExitStrategyResult {
    let units = unit_sales(params);
    let unit_count = total_units(params);
    let gross_revenue: Money = units.iter().map(|u| u.gross_proceeds).sum();
    let selling_costs = gross_revenue * deal.selling_cost_rate
        + params.per_unit_selling_cost * Decimal::from(unit_count);

    let months = deal.rehab_months + params.months_to_sell;
    let (loan_amount, points_cost, monthly_interest) = acquisition_terms(deal);
    let spend = subdivision_spend(deal, params);

    let plan = ShortTermPlan {
        upfront: deal.purchase_price + deal.closing_costs + points_cost - loan_amount,
        spread: spend,
        spread_months: deal.rehab_months,
        monthly_carry: deal.monthly_holding_costs + monthly_interest,
        months,
        final_inflow: gross_revenue - selling_costs - loan_amount,
    };

    let carry = plan.monthly_carry * Decimal::from(plan.months());
    let total_costs =
        deal.purchase_price + deal.closing_costs + points_cost + spend + carry + selling_costs;

    short_term_result(
        StrategyKind::Subdivide,
        &plan,
        gross_revenue,
        total_costs,
        StrategyDetails::Subdivide {
            units,
            total_units: unit_count,
            selling_costs,
        },
    )
}

fn evaluate_wholesale(params: &WholesaleParams) -> ExitStrategyResult {
    let plan = ShortTermPlan {
        upfront: params.marketing_costs + params.earnest_money,
        spread: Decimal::ZERO,
        spread_months: 0,
        monthly_carry: Decimal::ZERO,
        months: params.months,
        final_inflow: params.assignment_fee + params.earnest_money,
    };

    short_term_result(
        StrategyKind::Wholesale,
        &plan,
        params.assignment_fee,
        params.marketing_costs,
        StrategyDetails::Wholesale {
            assignment_fee: params.assignment_fee,
            earnest_money: params.earnest_money,
        },
    )
}

// ---------------------------------------------------------------------------
// Hold-type strategies (annual projection)
// ---------------------------------------------------------------------------

/// Scenario for renting `share` of the property after rehab.
#[allow(clippy::too_many_arguments)]
fn rental_scenario(
    deal: &PropertyDeal,
    ops: &RentalOperations,
    purchase_price: Money,
    closing_costs: Money,
    rehab_costs: Money,
    base_value: Money,
    financing: Option<FinancingTerms>,
    share: Decimal,
) -> ScenarioInputs {
    ScenarioInputs {
        property_name: deal.property_name.clone(),
        purchase_price,
        closing_costs,
        rehab_costs,
        base_value: Some(base_value),
        financing,
        gross_scheduled_rent: ops.monthly_rent * dec!(12) * share,
        vacancy_rate: ops.vacancy_rate,
        other_income: Decimal::ZERO,
        growth: GrowthAssumptions {
            rent_growth: ops.rent_growth,
            other_income_growth: Decimal::ZERO,
            expense_growth: ops.expense_growth,
            appreciation_rate: ops.appreciation_rate,
        },
        expenses: vec![ExpenseLineItem {
            name: "operating".into(),
            annual_amount: ops.monthly_operating_expenses * dec!(12) * share,
            growth_rate: None,
        }],
        management_fee_rate: ops.management_fee_rate,
        management_fee_basis: Default::default(),
        horizon: ops.hold_years,
        frequency: PeriodFrequency::Annual,
        refinance: None,
        capital_events: Vec::new(),
        exit: ExitAssumptions {
            valuation: ExitValuation::Appreciation,
            exit_cap_rate: None,
            selling_cost_rate: deal.selling_cost_rate,
        },
        start_date: None,
    }
}

/// Sum of effective gross income over the hold plus the gross sale price.
fn hold_gross_revenue(projection: &[PeriodProjection], exit: &ExitProceeds) -> Money {
    projection
        .iter()
        .map(|p| p.effective_gross_income)
        .sum::<Money>()
        + exit.exit_value
}

fn evaluate_hold(deal: &PropertyDeal, params: &HoldParams) -> PropCalcResult<ExitStrategyResult> {
    let ops = &params.operations;
    let rehab_carry = deal.monthly_holding_costs * Decimal::from(deal.rehab_months);
    let inputs = rental_scenario(
        deal,
        ops,
        deal.purchase_price,
        deal.closing_costs + rehab_carry,
        deal.rehab_costs,
        deal.arv,
        params.financing.clone(),
        Decimal::ONE,
    );
    let run = run_pipeline(&inputs)?;
    let m = &run.metrics;

    let total_investment = inputs.initial_investment();
    let gross_revenue = hold_gross_revenue(&run.projection, &run.exit);
    let timeline_months = deal.rehab_months + ops.hold_years * 12;
    let roi = safe_div(m.total_profit, total_investment);

    Ok(ExitStrategyResult {
        strategy: StrategyKind::Hold,
        total_investment,
        gross_revenue,
        total_costs: gross_revenue - m.total_profit,
        net_profit: m.total_profit,
        roi,
        annualized_roi: annualized_roi(roi, timeline_months),
        irr: m.irr,
        irr_converged: m.irr_converged,
        timeline_months,
        details: StrategyDetails::Hold {
            monthly_cash_flow_year1: m.net_cash_flow_year1 / dec!(12),
            equity_multiple: m.equity_multiple,
            exit: run.exit.clone(),
        },
    })
}

/// Buy and rehab on the acquisition loan, refinance at ARV, then hold.
///
/// The rehab months are folded into period 0 of the equity vector: the
/// cash left in the deal after the refinance is the initial outlay.
fn evaluate_brrrr(
    deal: &PropertyDeal,
    params: &BrrrrParams,
    warnings: &mut Vec<String>,
) -> PropCalcResult<ExitStrategyResult> {
    let ops = &params.operations;
    let (loan_amount, points_cost, monthly_interest) = acquisition_terms(deal);
    let rehab_months = Decimal::from(deal.rehab_months);
    let cash_invested_before_refinance = deal.purchase_price + deal.closing_costs + points_cost
        - loan_amount
        + deal.rehab_costs
        + (deal.monthly_holding_costs + monthly_interest) * rehab_months;

    let refinance_loan = deal.arv * params.refinance_ltv;
    let refinance_costs = refinance_loan * params.refinance_cost_rate;
    let cash_out = refinance_loan - loan_amount - refinance_costs;
    let cash_left_in_deal = cash_invested_before_refinance - cash_out;
    debug!("BRRRR refinance: loan {refinance_loan}, cash out {cash_out}, left in deal {cash_left_in_deal}");

    let inputs = rental_scenario(
        deal,
        ops,
        deal.arv,
        Decimal::ZERO,
        Decimal::ZERO,
        deal.arv,
        Some(FinancingTerms {
            ltv: params.refinance_ltv,
            annual_rate: params.refinance_rate,
            term_years: params.refinance_term_years,
            points: Decimal::ZERO,
            mode: Default::default(),
        }),
        Decimal::ONE,
    );
    let run = run_pipeline(&inputs)?;
    let m = &run.metrics;

    let vector = build_cash_flow_vector(cash_left_in_deal, &run.projection, run.exit.net_proceeds);
    let solution = solve_irr(&vector);

    let returned: Money = vector.iter().skip(1).copied().sum();
    let net_profit = returned - cash_left_in_deal;
    let gross_revenue = hold_gross_revenue(&run.projection, &run.exit);
    let timeline_months = deal.rehab_months + ops.hold_years * 12;

    if cash_left_in_deal <= Decimal::ZERO {
        warnings.push("BRRRR refinance returns all invested cash; ROI is reported as zero".into());
    }
    let roi = if cash_left_in_deal > Decimal::ZERO {
        net_profit / cash_left_in_deal
    } else {
        Decimal::ZERO
    };

    Ok(ExitStrategyResult {
        strategy: StrategyKind::Brrrr,
        total_investment: cash_left_in_deal,
        gross_revenue,
        total_costs: gross_revenue - net_profit,
        net_profit,
        roi,
        annualized_roi: annualized_roi(roi, timeline_months),
        irr: solution.rate,
        irr_converged: solution.converged,
        timeline_months,
        details: StrategyDetails::Brrrr {
            cash_invested_before_refinance,
            refinance_loan,
            refinance_costs,
            cash_out,
            cash_left_in_deal,
            monthly_cash_flow_year1: m.net_cash_flow_year1 / dec!(12),
            exit: run.exit.clone(),
        },
    })
}

/// Sell `sell_fraction` of the subdivided units and rent the rest.
///
/// Unit sales close with the stabilisation of the rentals, so their net
/// proceeds offset the period-0 outlay of the annual equity vector.
fn evaluate_hybrid(
    deal: &PropertyDeal,
    params: &HybridParams,
    subdivide: &SubdivideParams,
    hold: &HoldParams,
) -> PropCalcResult<ExitStrategyResult> {
    let ops = &hold.operations;
    let unit_count = total_units(subdivide);
    let units_sold = (Decimal::from(unit_count) * params.sell_fraction)
        .round()
        .to_u32()
        .unwrap_or(0)
        .min(unit_count);
    let units_retained = unit_count - units_sold;

    let gross_all: Money = unit_sales(subdivide).iter().map(|u| u.gross_proceeds).sum();
    let average_price = safe_div(gross_all, Decimal::from(unit_count));
    let sale_gross = average_price * Decimal::from(units_sold);
    let sale_costs = sale_gross * deal.selling_cost_rate
        + subdivide.per_unit_selling_cost * Decimal::from(units_sold);

    let (loan_amount, points_cost, monthly_interest) = acquisition_terms(deal);
    let setup_months = Decimal::from(deal.rehab_months + subdivide.months_to_sell);
    let cash_invested = deal.purchase_price + deal.closing_costs + points_cost - loan_amount
        + subdivision_spend(deal, subdivide)
        + (deal.monthly_holding_costs + monthly_interest) * setup_months;
    let net_sale_proceeds = sale_gross - sale_costs - loan_amount;

    let retained_share = safe_div(Decimal::from(units_retained), Decimal::from(unit_count));
    let inputs = rental_scenario(
        deal,
        ops,
        Decimal::ZERO,
        Decimal::ZERO,
        Decimal::ZERO,
        deal.arv * retained_share,
        None,
        retained_share,
    );
    let run = run_pipeline(&inputs)?;
    let m = &run.metrics;

    let equity_at_start = cash_invested - net_sale_proceeds;
    let vector = build_cash_flow_vector(equity_at_start, &run.projection, run.exit.net_proceeds);
    let solution = solve_irr(&vector);

    let operating_and_exit: Money = vector.iter().skip(1).copied().sum();
    let net_profit = net_sale_proceeds + operating_and_exit - cash_invested;
    let gross_revenue = sale_gross + hold_gross_revenue(&run.projection, &run.exit);
    let timeline_months = deal.rehab_months + subdivide.months_to_sell + ops.hold_years * 12;
    let roi = safe_div(net_profit, cash_invested);

    Ok(ExitStrategyResult {
        strategy: StrategyKind::Hybrid,
        total_investment: cash_invested,
        gross_revenue,
        total_costs: gross_revenue - net_profit,
        net_profit,
        roi,
        annualized_roi: annualized_roi(roi, timeline_months),
        irr: solution.rate,
        irr_converged: solution.converged,
        timeline_months,
        details: StrategyDetails::Hybrid {
            units_sold,
            units_retained,
            net_sale_proceeds,
            monthly_cash_flow_year1: m.net_cash_flow_year1 / dec!(12),
            exit: run.exit.clone(),
        },
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_deal(deal: &PropertyDeal) -> PropCalcResult<()> {
    for (field, value) in [
        ("purchase_price", deal.purchase_price),
        ("closing_costs", deal.closing_costs),
        ("rehab_costs", deal.rehab_costs),
        ("monthly_holding_costs", deal.monthly_holding_costs),
    ] {
        if value < Decimal::ZERO {
            return Err(PropCalcError::invalid(field, "Cannot be negative"));
        }
    }
    if deal.arv < Decimal::ZERO {
        return Err(PropCalcError::invalid("arv", "After-repair value cannot be negative"));
    }
    if deal.selling_cost_rate < Decimal::ZERO || deal.selling_cost_rate >= Decimal::ONE {
        return Err(PropCalcError::invalid("selling_cost_rate", "Must be in [0, 1)"));
    }
    if let Some(l) = &deal.acquisition_loan {
        if l.ltv < Decimal::ZERO || l.ltv >= Decimal::ONE {
            return Err(PropCalcError::invalid("acquisition_loan.ltv", "Must be in [0, 1)"));
        }
        if l.annual_rate < Decimal::ZERO || l.points < Decimal::ZERO {
            return Err(PropCalcError::invalid(
                "acquisition_loan",
                "Rate and points cannot be negative",
            ));
        }
    }
    if let Some(h) = &deal.hold {
        validate_operations("hold", &h.operations)?;
    }
    if let Some(b) = &deal.brrrr {
        validate_operations("brrrr", &b.operations)?;
        if b.refinance_ltv <= Decimal::ZERO || b.refinance_ltv >= Decimal::ONE {
            return Err(PropCalcError::invalid("brrrr.refinance_ltv", "Must be in (0, 1)"));
        }
        if b.refinance_rate < Decimal::ZERO || b.refinance_term_years == 0 {
            return Err(PropCalcError::invalid(
                "brrrr",
                "Refinance rate must be non-negative with a term of at least 1 year",
            ));
        }
    }
    if let Some(s) = &deal.subdivide {
        if total_units(s) == 0 {
            return Err(PropCalcError::invalid("subdivide.unit_types", "At least one unit is required"));
        }
        if s.unit_types.iter().any(|u| u.base_price < Decimal::ZERO) {
            return Err(PropCalcError::invalid("subdivide.unit_types", "Unit prices cannot be negative"));
        }
    }
    if let Some(h) = &deal.hybrid {
        if h.sell_fraction <= Decimal::ZERO || h.sell_fraction >= Decimal::ONE {
            return Err(PropCalcError::invalid("hybrid.sell_fraction", "Must be in (0, 1)"));
        }
    }
    if let Some(w) = &deal.wholesale {
        if w.assignment_fee < Decimal::ZERO
            || w.marketing_costs < Decimal::ZERO
            || w.earnest_money < Decimal::ZERO
        {
            return Err(PropCalcError::invalid("wholesale", "Amounts cannot be negative"));
        }
    }
    Ok(())
}

fn validate_operations(prefix: &str, ops: &RentalOperations) -> PropCalcResult<()> {
    if ops.hold_years == 0 || ops.hold_years > PeriodFrequency::Annual.max_horizon() {
        return Err(PropCalcError::invalid(
            format!("{prefix}.hold_years"),
            "Hold period must be between 1 and 30 years",
        ));
    }
    if ops.monthly_rent < Decimal::ZERO || ops.monthly_operating_expenses < Decimal::ZERO {
        return Err(PropCalcError::invalid(
            prefix,
            "Rent and operating expenses cannot be negative",
        ));
    }
    Ok(())
}
