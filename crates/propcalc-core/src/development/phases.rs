use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropCalcError;
use crate::irr::{solve_irr_with_guess, INITIAL_GUESS};
use crate::time_value::{annualize_periodic_rate, growth_factor, periodic_rate};
use crate::types::{
    safe_div, with_metadata, ComputationOutput, Money, Multiple, PeriodFrequency, Rate,
};
use crate::PropCalcResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Acquisition,
    Development,
    Conversion,
    Sales,
    Completed,
}

/// Land/construction loan. Draws a fixed share of acquisition and
/// development spend and is repaid out of unit sales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionLoan {
    /// Loan-to-cost on land and development spend
    pub ltc: Rate,
    pub annual_rate: Rate,
    /// Share of each month's gross sales proceeds swept to the loan
    #[serde(default = "default_paydown_fraction")]
    pub paydown_fraction: Rate,
}

fn default_paydown_fraction() -> Rate {
    dec!(0.70)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentInput {
    #[serde(default)]
    pub project_name: String,
    pub land_cost: Money,
    #[serde(default)]
    pub due_diligence_costs: Money,
    #[serde(default)]
    pub closing_costs: Money,
    pub hard_costs: Money,
    #[serde(default)]
    pub soft_costs: Money,
    pub development_months: u32,
    #[serde(default)]
    pub conversion_months: u32,
    #[serde(default)]
    pub conversion_cost_per_unit: Money,
    pub total_units: u32,
    pub sales_months: u32,
    /// Unit price in the first sales month
    pub base_unit_price: Money,
    /// Annual unit price escalation during the sell-out
    #[serde(default)]
    pub price_escalation: Rate,
    #[serde(default = "default_selling_cost_rate")]
    pub selling_cost_rate: Rate,
    #[serde(default)]
    pub annual_property_tax: Money,
    #[serde(default)]
    pub annual_insurance: Money,
    #[serde(default)]
    pub annual_maintenance: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction_loan: Option<ConstructionLoan>,
    /// Pads the schedule with completed months up to this length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_months: Option<u32>,
}

fn default_selling_cost_rate() -> Rate {
    dec!(0.06)
}

/// Inclusive month range occupied by one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub phase: Phase,
    pub start_month: u32,
    pub end_month: u32,
}

impl PhaseWindow {
    pub fn months(&self) -> u32 {
        self.end_month + 1 - self.start_month
    }

    pub fn contains(&self, month: u32) -> bool {
        (self.start_month..=self.end_month).contains(&month)
    }
}

/// One month of the development schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentPeriod {
    pub month: u32,
    pub phase: Phase,
    pub acquisition_cost: Money,
    pub development_cost: Money,
    pub conversion_cost: Money,
    pub carrying_cost: Money,
    pub loan_draw: Money,
    /// Interest on the opening loan balance, paid from equity
    pub loan_interest: Money,
    pub units_sold: Decimal,
    pub unit_price: Money,
    pub sales_proceeds: Money,
    pub selling_costs: Money,
    pub loan_paydown: Money,
    pub loan_balance: Money,
    /// Equity cash flow (negative = contribution)
    pub net_cash_flow: Money,
    pub cumulative_cash_flow: Money,
    pub cumulative_units_sold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentOutput {
    pub periods: Vec<DevelopmentPeriod>,
    pub phases: Vec<PhaseWindow>,
    pub total_units_sold: Decimal,
    pub total_revenue: Money,
    pub total_project_cost: Money,
    pub total_interest: Money,
    pub equity_invested: Money,
    /// Deepest point of the cumulative equity position
    pub peak_equity: Money,
    pub total_profit: Money,
    pub equity_multiple: Multiple,
    pub profit_margin: Rate,
    /// Monthly IRR annualised as (1 + r)^12 - 1
    pub irr: Rate,
    pub irr_converged: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Ordered, non-overlapping phase windows. Acquisition always occupies
/// month 1 on its own; a zero-month conversion phase is omitted.
pub fn phase_windows(input: &DevelopmentInput) -> Vec<PhaseWindow> {
    let mut windows = Vec::with_capacity(5);
    let mut next = 1;
    let mut push = |phase: Phase, months: u32| {
        if months > 0 {
            windows.push(PhaseWindow {
                phase,
                start_month: next,
                end_month: next.saturating_add(months - 1),
            });
            next = next.saturating_add(months);
        }
    };

    push(Phase::Acquisition, 1);
    push(Phase::Development, input.development_months);
    push(Phase::Conversion, input.conversion_months);
    push(Phase::Sales, input.sales_months);

    let scheduled = scheduled_months(input).unwrap_or(u32::MAX);
    if let Some(h) = input.horizon_months {
        if h > scheduled {
            push(Phase::Completed, h - scheduled);
        }
    }
    windows
}

/// Acquisition month plus every phase, or `None` on overflow.
fn scheduled_months(input: &DevelopmentInput) -> Option<u32> {
    1u32.checked_add(input.development_months)?
        .checked_add(input.conversion_months)?
        .checked_add(input.sales_months)
}

/// Month-by-month schedule of a build-and-sell project with its equity
/// returns.
pub fn schedule_development(
    input: &DevelopmentInput,
) -> PropCalcResult<ComputationOutput<DevelopmentOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input, &mut warnings)?;

    let phases = phase_windows(input);
    let (ltc, monthly_rate, paydown_fraction) = match &input.construction_loan {
        Some(l) => (l.ltc, l.annual_rate / MONTHS_PER_YEAR, l.paydown_fraction),
        None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
    };

    let monthly_carrying =
        (input.annual_property_tax + input.annual_insurance + input.annual_maintenance)
            / MONTHS_PER_YEAR;
    let development_total = input.hard_costs + input.soft_costs;
    let total_units = Decimal::from(input.total_units);
    let units_per_month = total_units / Decimal::from(input.sales_months);

    let mut periods = Vec::new();
    let mut loan_balance = Decimal::ZERO;
    let mut cumulative = Decimal::ZERO;
    let mut cumulative_units = Decimal::ZERO;

    for window in &phases {
        for month in window.start_month..=window.end_month {
            let opening_balance = loan_balance;
            let loan_interest = opening_balance * monthly_rate;

            let mut row = DevelopmentPeriod {
                month,
                phase: window.phase,
                acquisition_cost: Decimal::ZERO,
                development_cost: Decimal::ZERO,
                conversion_cost: Decimal::ZERO,
                carrying_cost: Decimal::ZERO,
                loan_draw: Decimal::ZERO,
                loan_interest,
                units_sold: Decimal::ZERO,
                unit_price: Decimal::ZERO,
                sales_proceeds: Decimal::ZERO,
                selling_costs: Decimal::ZERO,
                loan_paydown: Decimal::ZERO,
                loan_balance: Decimal::ZERO,
                net_cash_flow: Decimal::ZERO,
                cumulative_cash_flow: Decimal::ZERO,
                cumulative_units_sold: cumulative_units,
            };

            match window.phase {
                Phase::Acquisition => {
                    row.acquisition_cost =
                        input.land_cost + input.due_diligence_costs + input.closing_costs;
                    row.loan_draw = input.land_cost * ltc;
                }
                Phase::Development => {
                    row.development_cost =
                        development_total / Decimal::from(input.development_months);
                    row.carrying_cost = monthly_carrying;
                    row.loan_draw = row.development_cost * ltc;
                }
                Phase::Conversion => {
                    row.conversion_cost = input.conversion_cost_per_unit * total_units
                        / Decimal::from(input.conversion_months);
                    row.carrying_cost = monthly_carrying;
                }
                Phase::Sales => {
                    let is_final = month == window.end_month;
                    row.units_sold = if is_final {
                        total_units - cumulative_units
                    } else {
                        units_per_month.min(total_units - cumulative_units)
                    };
                    let years_into_sales =
                        Decimal::from(month - window.start_month) / MONTHS_PER_YEAR;
                    row.unit_price = input.base_unit_price
                        * growth_factor(input.price_escalation, years_into_sales);
                    row.sales_proceeds = row.units_sold * row.unit_price;
                    row.selling_costs = row.sales_proceeds * input.selling_cost_rate;
                    row.carrying_cost = monthly_carrying;
                    row.loan_paydown = if is_final {
                        opening_balance
                    } else {
                        (row.sales_proceeds * paydown_fraction).min(opening_balance)
                    };
                    cumulative_units = if is_final {
                        total_units
                    } else {
                        cumulative_units + row.units_sold
                    };
                    row.cumulative_units_sold = cumulative_units;
                }
                Phase::Completed => {}
            }

            loan_balance = opening_balance + row.loan_draw - row.loan_paydown;
            row.loan_balance = loan_balance;
            row.net_cash_flow = row.sales_proceeds + row.loan_draw
                - row.acquisition_cost
                - row.development_cost
                - row.conversion_cost
                - row.carrying_cost
                - row.loan_interest
                - row.selling_costs
                - row.loan_paydown;
            cumulative += row.net_cash_flow;
            row.cumulative_cash_flow = cumulative;
            periods.push(row);
        }
    }

    // --- Summary ---
    let sum = |f: fn(&DevelopmentPeriod) -> Money| periods.iter().map(f).sum::<Money>();
    let total_revenue = sum(|p| p.sales_proceeds);
    let total_interest = sum(|p| p.loan_interest);
    let total_project_cost = sum(|p| {
        p.acquisition_cost + p.development_cost + p.conversion_cost + p.carrying_cost
    }) + total_interest
        + sum(|p| p.selling_costs);
    let equity_invested: Money = periods
        .iter()
        .filter(|p| p.net_cash_flow < Decimal::ZERO)
        .map(|p| -p.net_cash_flow)
        .sum();
    let distributions: Money = periods
        .iter()
        .filter(|p| p.net_cash_flow > Decimal::ZERO)
        .map(|p| p.net_cash_flow)
        .sum();
    let peak_equity = periods
        .iter()
        .map(|p| -p.cumulative_cash_flow)
        .fold(Decimal::ZERO, Decimal::max);
    let total_profit = cumulative;

    let vector: Vec<Money> = periods.iter().map(|p| p.net_cash_flow).collect();
    let solution = solve_irr_with_guess(&vector, periodic_rate(INITIAL_GUESS, 12));
    let irr = annualize_periodic_rate(solution.rate, 12);
    debug!(
        "development schedule: {} months, profit {total_profit}, irr {irr}",
        periods.len()
    );

    if !solution.converged {
        warnings.push("IRR did not converge; reported rate is a best-effort estimate".into());
    }
    if total_profit < Decimal::ZERO {
        warnings.push("Project loses money at these assumptions".into());
    }

    let output = DevelopmentOutput {
        total_units_sold: cumulative_units,
        total_revenue,
        total_project_cost,
        total_interest,
        equity_invested,
        peak_equity,
        total_profit,
        equity_multiple: safe_div(distributions, equity_invested),
        profit_margin: safe_div(total_profit, total_revenue),
        irr,
        irr_converged: solution.converged,
        periods,
        phases,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Phased Development Schedule (monthly, construction loan, unit absorption)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate_input(input: &DevelopmentInput, warnings: &mut Vec<String>) -> PropCalcResult<()> {
    for (field, value) in [
        ("land_cost", input.land_cost),
        ("due_diligence_costs", input.due_diligence_costs),
        ("closing_costs", input.closing_costs),
        ("hard_costs", input.hard_costs),
        ("soft_costs", input.soft_costs),
        ("conversion_cost_per_unit", input.conversion_cost_per_unit),
        ("base_unit_price", input.base_unit_price),
        ("annual_property_tax", input.annual_property_tax),
        ("annual_insurance", input.annual_insurance),
        ("annual_maintenance", input.annual_maintenance),
    ] {
        if value < Decimal::ZERO {
            return Err(PropCalcError::invalid(field, "Cannot be negative"));
        }
    }
    if input.development_months == 0 {
        return Err(PropCalcError::invalid(
            "development_months",
            "Development phase needs at least one month",
        ));
    }
    if input.sales_months == 0 {
        return Err(PropCalcError::invalid(
            "sales_months",
            "Sales phase needs at least one month",
        ));
    }
    if input.total_units == 0 {
        return Err(PropCalcError::invalid("total_units", "At least one unit is required"));
    }
    if input.conversion_months == 0 && input.conversion_cost_per_unit > Decimal::ZERO {
        return Err(PropCalcError::invalid(
            "conversion_months",
            "Conversion costs need a conversion phase of at least one month",
        ));
    }
    if input.selling_cost_rate < Decimal::ZERO || input.selling_cost_rate >= Decimal::ONE {
        return Err(PropCalcError::invalid("selling_cost_rate", "Must be in [0, 1)"));
    }
    if input.price_escalation <= dec!(-1) {
        return Err(PropCalcError::invalid(
            "price_escalation",
            "Escalation must be greater than -100%",
        ));
    }
    if let Some(l) = &input.construction_loan {
        if l.ltc < Decimal::ZERO || l.ltc >= Decimal::ONE {
            return Err(PropCalcError::invalid("construction_loan.ltc", "Must be in [0, 1)"));
        }
        if l.annual_rate < Decimal::ZERO {
            return Err(PropCalcError::invalid(
                "construction_loan.annual_rate",
                "Interest rate cannot be negative",
            ));
        }
        if l.paydown_fraction < Decimal::ZERO || l.paydown_fraction > Decimal::ONE {
            return Err(PropCalcError::invalid(
                "construction_loan.paydown_fraction",
                "Must be in [0, 1]",
            ));
        }
        if l.ltc > dec!(0.80) {
            warnings.push(format!(
                "Loan-to-cost of {:.0}% is above typical construction lending limits",
                l.ltc * dec!(100)
            ));
        }
    }
    let max_months = PeriodFrequency::Monthly.max_horizon();
    let scheduled = match scheduled_months(input) {
        Some(m) if m <= max_months => m,
        _ => {
            return Err(PropCalcError::invalid(
                "development_months",
                format!("Acquisition and all phases must fit within {max_months} months"),
            ))
        }
    };
    if let Some(h) = input.horizon_months {
        if h > max_months {
            return Err(PropCalcError::invalid(
                "horizon_months",
                format!("Horizon cannot exceed {max_months} months"),
            ));
        }
        if h < scheduled {
            return Err(PropCalcError::invalid(
                "horizon_months",
                format!("Horizon of {h} months is shorter than the {scheduled}-month schedule"),
            ));
        }
    }
    Ok(())
}
