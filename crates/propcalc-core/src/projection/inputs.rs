use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::DebtServiceMode;
use crate::error::PropCalcError;
use crate::exit::valuation::{ExitAssumptions, ExitValuation};
use crate::types::{Money, PeriodFrequency, Rate};
use crate::PropCalcResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Acquisition or long-term financing terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingTerms {
    /// Loan-to-value against the purchase price (0.75 = 75%)
    pub ltv: Rate,
    /// Annual interest rate
    pub annual_rate: Rate,
    /// Amortization term in years
    pub term_years: u32,
    /// Origination points as a fraction of the loan (0.01 = 1 point)
    #[serde(default)]
    pub points: Rate,
    #[serde(default)]
    pub mode: DebtServiceMode,
}

/// One operating-expense line (taxes, insurance, repairs, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseLineItem {
    pub name: String,
    /// Year-1 annual amount
    pub annual_amount: Money,
    /// Own escalation rate; falls back to the shared expense growth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<Rate>,
}

/// What the management fee percentage is charged on.
///
/// Calculators disagree on this, so both conventions stay selectable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementFeeBasis {
    /// Percent of collected income (after vacancy, including other income)
    #[default]
    EffectiveGrossIncome,
    /// Percent of gross scheduled rent
    GrossRent,
}

/// Annual escalation assumptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrowthAssumptions {
    #[serde(default)]
    pub rent_growth: Rate,
    #[serde(default)]
    pub other_income_growth: Rate,
    #[serde(default)]
    pub expense_growth: Rate,
    #[serde(default)]
    pub appreciation_rate: Rate,
}

/// A one-time cash-out refinance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinanceTerms {
    /// Period at whose end the refinance closes (1-based)
    pub period: u32,
    /// Loan-to-value of the new loan against the appreciated value
    pub new_ltv: Rate,
    pub annual_rate: Rate,
    pub term_years: u32,
    /// Refinance costs as a fraction of the new loan
    #[serde(default)]
    pub cost_rate: Rate,
    #[serde(default)]
    pub mode: DebtServiceMode,
}

/// A one-time flow attributed to a single period.
/// Negative amounts are capital calls, positive amounts distributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalEvent {
    pub period: u32,
    pub amount: Money,
    #[serde(default)]
    pub label: String,
}

/// Immutable snapshot of one calculator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInputs {
    #[serde(default)]
    pub property_name: String,
    pub purchase_price: Money,
    #[serde(default)]
    pub closing_costs: Money,
    #[serde(default)]
    pub rehab_costs: Money,
    /// Value the property appreciates from (e.g. ARV); defaults to price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingTerms>,
    /// Annual gross scheduled rent
    pub gross_scheduled_rent: Money,
    pub vacancy_rate: Rate,
    /// Annual other income (parking, laundry, fees)
    #[serde(default)]
    pub other_income: Money,
    #[serde(default)]
    pub growth: GrowthAssumptions,
    #[serde(default)]
    pub expenses: Vec<ExpenseLineItem>,
    #[serde(default)]
    pub management_fee_rate: Rate,
    #[serde(default)]
    pub management_fee_basis: ManagementFeeBasis,
    /// Number of projection periods
    pub horizon: u32,
    #[serde(default)]
    pub frequency: PeriodFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinance: Option<RefinanceTerms>,
    #[serde(default)]
    pub capital_events: Vec<CapitalEvent>,
    #[serde(default)]
    pub exit: ExitAssumptions,
    /// Labels each period with its end date when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

impl ScenarioInputs {
    pub fn periods_per_year(&self) -> u32 {
        self.frequency.periods_per_year()
    }

    pub fn base_value(&self) -> Money {
        self.base_value.unwrap_or(self.purchase_price)
    }

    pub fn loan_amount(&self) -> Money {
        self.financing
            .as_ref()
            .map(|f| self.purchase_price * f.ltv)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn points_cost(&self) -> Money {
        self.financing
            .as_ref()
            .map(|f| self.loan_amount() * f.points)
            .unwrap_or(Decimal::ZERO)
    }

    /// Cash invested at closing: down payment, closing costs, points and rehab.
    pub fn initial_investment(&self) -> Money {
        self.purchase_price - self.loan_amount()
            + self.closing_costs
            + self.points_cost()
            + self.rehab_costs
    }

    /// Reject structurally invalid inputs; flag values outside the usual
    /// calculator ranges as warnings.
    pub fn validate(&self, warnings: &mut Vec<String>) -> PropCalcResult<()> {
        for (field, amount) in [
            ("purchase_price", self.purchase_price),
            ("closing_costs", self.closing_costs),
            ("rehab_costs", self.rehab_costs),
            ("gross_scheduled_rent", self.gross_scheduled_rent),
            ("other_income", self.other_income),
            ("management_fee_rate", self.management_fee_rate),
        ] {
            if amount < Decimal::ZERO {
                return Err(PropCalcError::invalid(field, "Cannot be negative"));
            }
        }

        if let Some(bv) = self.base_value {
            if bv < Decimal::ZERO {
                return Err(PropCalcError::invalid("base_value", "Cannot be negative"));
            }
        }

        if self.vacancy_rate < Decimal::ZERO || self.vacancy_rate > Decimal::ONE {
            return Err(PropCalcError::invalid(
                "vacancy_rate",
                "Vacancy rate must be between 0 and 1",
            ));
        }

        let max_horizon = self.frequency.max_horizon();
        if self.horizon > max_horizon {
            return Err(PropCalcError::invalid(
                "horizon",
                format!("Horizon is limited to {max_horizon} periods"),
            ));
        }

        for (field, rate) in [
            ("growth.rent_growth", self.growth.rent_growth),
            ("growth.other_income_growth", self.growth.other_income_growth),
            ("growth.expense_growth", self.growth.expense_growth),
            ("growth.appreciation_rate", self.growth.appreciation_rate),
        ] {
            validate_growth(field, rate)?;
        }

        for item in &self.expenses {
            if item.annual_amount < Decimal::ZERO {
                return Err(PropCalcError::invalid(
                    format!("expenses.{}", item.name),
                    "Expense amount cannot be negative",
                ));
            }
            if let Some(g) = item.growth_rate {
                validate_growth(&format!("expenses.{}.growth_rate", item.name), g)?;
            }
        }

        if let Some(f) = &self.financing {
            validate_financing(f)?;
            if f.ltv < dec!(0.50) || f.ltv > dec!(0.90) {
                warnings.push(format!(
                    "LTV of {:.1}% is outside the typical 50-90% range",
                    f.ltv * dec!(100)
                ));
            }
            if f.annual_rate < dec!(0.02) || f.annual_rate > dec!(0.25) {
                warnings.push(format!(
                    "Interest rate of {:.2}% is outside the typical 2-25% range",
                    f.annual_rate * dec!(100)
                ));
            }
        }

        if let Some(r) = &self.refinance {
            if r.period == 0 || r.period > self.horizon {
                return Err(PropCalcError::invalid(
                    "refinance.period",
                    format!("Refinance period must fall within 1..={}", self.horizon),
                ));
            }
            if r.new_ltv < Decimal::ZERO || r.new_ltv >= Decimal::ONE {
                return Err(PropCalcError::invalid(
                    "refinance.new_ltv",
                    "New LTV must be between 0 and 1 (exclusive upper)",
                ));
            }
            if r.annual_rate < Decimal::ZERO || r.term_years == 0 || r.cost_rate < Decimal::ZERO {
                return Err(PropCalcError::invalid(
                    "refinance",
                    "Refinance rate and cost must be non-negative with a term of at least 1 year",
                ));
            }
        }

        for event in &self.capital_events {
            if event.period == 0 || event.period > self.horizon {
                return Err(PropCalcError::invalid(
                    "capital_events.period",
                    format!(
                        "Event '{}' at period {} is outside the horizon",
                        event.label, event.period
                    ),
                ));
            }
        }

        if self.exit.selling_cost_rate < Decimal::ZERO || self.exit.selling_cost_rate >= Decimal::ONE
        {
            return Err(PropCalcError::invalid(
                "exit.selling_cost_rate",
                "Selling costs must be between 0 and 1 (exclusive upper)",
            ));
        }
        if self.exit.valuation == ExitValuation::CapRate {
            match self.exit.exit_cap_rate {
                Some(cap) if cap > Decimal::ZERO => {
                    if cap < dec!(0.03) || cap > dec!(0.12) {
                        warnings.push(format!(
                            "Exit cap rate {cap} is outside the usual 3-12% band"
                        ));
                    }
                }
                _ => {
                    return Err(PropCalcError::invalid(
                        "exit.exit_cap_rate",
                        "A positive exit cap rate is required for cap-rate exits",
                    ));
                }
            }
        }

        if self.vacancy_rate > dec!(0.15) {
            warnings.push(format!(
                "Vacancy rate {:.1}% exceeds the typical 15% market ceiling",
                self.vacancy_rate * dec!(100)
            ));
        }

        Ok(())
    }
}

fn validate_growth(field: &str, rate: Rate) -> PropCalcResult<()> {
    if rate <= dec!(-1) || rate > Decimal::ONE {
        return Err(PropCalcError::invalid(
            field,
            "Growth rates must lie in (-100%, 100%]",
        ));
    }
    Ok(())
}

fn validate_financing(f: &FinancingTerms) -> PropCalcResult<()> {
    if f.ltv < Decimal::ZERO || f.ltv >= Decimal::ONE {
        return Err(PropCalcError::invalid(
            "financing.ltv",
            "LTV must be between 0 and 1 (exclusive upper)",
        ));
    }
    if f.annual_rate < Decimal::ZERO {
        return Err(PropCalcError::invalid(
            "financing.annual_rate",
            "Interest rate cannot be negative",
        ));
    }
    if f.term_years == 0 {
        return Err(PropCalcError::invalid(
            "financing.term_years",
            "Loan term must be at least 1 year",
        ));
    }
    if f.points < Decimal::ZERO {
        return Err(PropCalcError::invalid(
            "financing.points",
            "Points cannot be negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Fourplex bought at 400k with 75% LTV, annual periods over ten years.
    pub fn fourplex() -> ScenarioInputs {
        ScenarioInputs {
            property_name: "Elm Street Fourplex".into(),
            purchase_price: dec!(400000),
            closing_costs: dec!(8000),
            rehab_costs: dec!(12000),
            base_value: None,
            financing: Some(FinancingTerms {
                ltv: dec!(0.75),
                annual_rate: dec!(0.065),
                term_years: 30,
                points: dec!(0.01),
                mode: DebtServiceMode::Amortizing,
            }),
            gross_scheduled_rent: dec!(57600),
            vacancy_rate: dec!(0.05),
            other_income: dec!(2400),
            growth: GrowthAssumptions {
                rent_growth: dec!(0.03),
                other_income_growth: dec!(0.02),
                expense_growth: dec!(0.025),
                appreciation_rate: dec!(0.03),
            },
            expenses: vec![
                ExpenseLineItem {
                    name: "property_tax".into(),
                    annual_amount: dec!(6000),
                    growth_rate: Some(dec!(0.02)),
                },
                ExpenseLineItem {
                    name: "insurance".into(),
                    annual_amount: dec!(2400),
                    growth_rate: None,
                },
                ExpenseLineItem {
                    name: "repairs".into(),
                    annual_amount: dec!(3600),
                    growth_rate: None,
                },
            ],
            management_fee_rate: dec!(0.08),
            management_fee_basis: ManagementFeeBasis::EffectiveGrossIncome,
            horizon: 10,
            frequency: PeriodFrequency::Annual,
            refinance: None,
            capital_events: vec![],
            exit: ExitAssumptions {
                valuation: ExitValuation::CapRate,
                exit_cap_rate: Some(dec!(0.065)),
                selling_cost_rate: dec!(0.06),
            },
            start_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::fourplex;
    use super::*;

    #[test]
    fn test_initial_investment() {
        let inputs = fourplex();
        // 100k down + 8k closing + 3k points + 12k rehab
        assert_eq!(inputs.loan_amount(), dec!(300000));
        assert_eq!(inputs.initial_investment(), dec!(123000));
    }

    #[test]
    fn test_cash_purchase_has_no_loan() {
        let mut inputs = fourplex();
        inputs.financing = None;
        assert_eq!(inputs.loan_amount(), Decimal::ZERO);
        assert_eq!(inputs.initial_investment(), dec!(420000));
    }

    #[test]
    fn test_validate_accepts_fixture() {
        let mut warnings = Vec::new();
        fourplex().validate(&mut warnings).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_validate_rejects_oversize_horizon() {
        let mut inputs = fourplex();
        inputs.horizon = 31;
        let err = inputs.validate(&mut Vec::new()).unwrap_err();
        match err {
            PropCalcError::InvalidInput { field, .. } => assert_eq!(field, "horizon"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_requires_cap_rate_for_cap_exit() {
        let mut inputs = fourplex();
        inputs.exit.exit_cap_rate = None;
        assert!(inputs.validate(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_high_ltv_warning() {
        let mut inputs = fourplex();
        if let Some(f) = inputs.financing.as_mut() {
            f.ltv = dec!(0.95);
        }
        let mut warnings = Vec::new();
        inputs.validate(&mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("LTV")));
    }
}
