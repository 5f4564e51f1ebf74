use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 1.8x equity multiple)
pub type Multiple = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Length of one projection period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodFrequency {
    #[default]
    Annual,
    Monthly,
}

impl PeriodFrequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            PeriodFrequency::Annual => 1,
            PeriodFrequency::Monthly => 12,
        }
    }

    /// Longest horizon a single projection may request.
    pub fn max_horizon(self) -> u32 {
        match self {
            PeriodFrequency::Annual => 30,
            PeriodFrequency::Monthly => 120,
        }
    }

    /// 1-based year containing the 1-based `period`.
    pub fn year_of(self, period: u32) -> u32 {
        (period.saturating_sub(1)) / self.periods_per_year() + 1
    }
}

/// Ratio with a zero fallback. Interactive recalculation must never fail
/// because a denominator (equity, cost, ARV, revenue) is still empty.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_safe_div_zero_denominator() {
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
    }

    #[test]
    fn test_year_of_monthly() {
        assert_eq!(PeriodFrequency::Monthly.year_of(1), 1);
        assert_eq!(PeriodFrequency::Monthly.year_of(12), 1);
        assert_eq!(PeriodFrequency::Monthly.year_of(13), 2);
        assert_eq!(PeriodFrequency::Annual.year_of(5), 5);
    }
}
