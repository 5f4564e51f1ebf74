use clap::Args;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use propcalc_core::projection::ScenarioInputs;
use propcalc_core::sensitivity::{
    self, BreakEvenInput, GridInput, Metric, SensitivityVariable, StressTestInput, SweepRange,
    TornadoInput,
};

use crate::input;

/// Arguments for a break-even search
#[derive(Args)]
pub struct BreakEvenArgs {
    /// Path to JSON input file with scenario, variable, metric, threshold and range
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON scenario file (used with the flags below)
    #[arg(long)]
    pub scenario: Option<String>,

    /// Variable to move (e.g. gross_rent, vacancy_rate, interest_rate)
    #[arg(long)]
    pub variable: Option<String>,

    /// Metric to hold at the threshold (irr, cash_on_cash, dscr, ...)
    #[arg(long)]
    pub metric: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub threshold: Option<Decimal>,

    /// Search range as low:high
    #[arg(long, allow_hyphen_values = true)]
    pub range: Option<String>,
}

/// Arguments for stress testing
#[derive(Args)]
pub struct StressArgs {
    /// Path to JSON file: {"scenario": {...}, "scenarios": [...]}; the
    /// standard downside set is used when no scenarios are given
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a tornado (one-way sensitivity) table
#[derive(Args)]
pub struct TornadoArgs {
    /// Path to JSON input file with scenario, metric and swing
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON scenario file (used with --metric)
    #[arg(long)]
    pub scenario: Option<String>,

    #[arg(long, default_value = "irr")]
    pub metric: String,

    /// Relative swing applied both ways
    #[arg(long, default_value = "0.10")]
    pub swing: Decimal,
}

/// Arguments for a two-way sensitivity table
#[derive(Args)]
pub struct GridArgs {
    /// Path to JSON input file with scenario, both sweeps and metric
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON scenario file (used with --var1/--var2)
    #[arg(long)]
    pub scenario: Option<String>,

    /// First sweep in format name:min:max:step
    /// (e.g. "gross_rent:50000:60000:2500")
    #[arg(long)]
    pub var1: Option<String>,

    /// Second sweep in format name:min:max:step
    #[arg(long)]
    pub var2: Option<String>,

    #[arg(long, default_value = "irr")]
    pub metric: String,
}

pub fn run_break_even(args: BreakEvenArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let be_input: BreakEvenInput = match args.scenario {
        Some(ref path) => {
            let (low, high) = parse_range(args.range.as_deref().ok_or("--range is required")?)?;
            BreakEvenInput {
                scenario: input::read_file(path)?,
                variable: parse_name(args.variable.as_deref().ok_or("--variable is required")?)?,
                metric: parse_name(args.metric.as_deref().ok_or("--metric is required")?)?,
                threshold: args.threshold.ok_or("--threshold is required")?,
                low,
                high,
            }
        }
        None => input::read_input(args.input.as_deref(), "break-even search")?,
    };
    let result = sensitivity::analyze_break_even(&be_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_stress(args: StressArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let stress_input: StressTestInput = input::read_input(args.input.as_deref(), "stress test")?;
    let result = sensitivity::stress_test(&stress_input.scenario, &stress_input.scenarios)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_tornado(args: TornadoArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tornado_input: TornadoInput = match args.scenario {
        Some(ref path) => TornadoInput {
            scenario: input::read_file(path)?,
            metric: parse_name(&args.metric)?,
            swing: args.swing,
        },
        None => input::read_input(args.input.as_deref(), "tornado")?,
    };
    let result = sensitivity::tornado(
        &tornado_input.scenario,
        tornado_input.metric,
        tornado_input.swing,
    )?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_sensitivity_grid(args: GridArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let grid_input: GridInput = match args.scenario {
        Some(ref path) => {
            let scenario: ScenarioInputs = input::read_file(path)?;
            GridInput {
                scenario,
                variable_1: parse_sweep(args.var1.as_deref().ok_or("--var1 is required")?)?,
                variable_2: parse_sweep(args.var2.as_deref().ok_or("--var2 is required")?)?,
                metric: parse_name::<Metric>(&args.metric)?,
            }
        }
        None => input::read_input(args.input.as_deref(), "sensitivity grid")?,
    };
    let result = sensitivity::sensitivity_grid(&grid_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Parse a snake_case enum name through its serde representation.
fn parse_name<T: DeserializeOwned>(name: &str) -> Result<T, Box<dyn std::error::Error>> {
    serde_json::from_value(Value::String(name.to_string()))
        .map_err(|_| format!("Unknown name '{}'", name).into())
}

fn parse_range(spec: &str) -> Result<(Decimal, Decimal), Box<dyn std::error::Error>> {
    let (low, high) = spec
        .split_once(':')
        .ok_or_else(|| format!("Range must be low:high, got '{}'", spec))?;
    Ok((low.parse()?, high.parse()?))
}

fn parse_sweep(spec: &str) -> Result<SweepRange, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!("Sweep must be name:min:max:step, got '{}'", spec).into());
    }
    Ok(SweepRange {
        variable: parse_name::<SensitivityVariable>(parts[0])?,
        min: parts[1].parse()?,
        max: parts[2].parse()?,
        step: parts[3].parse()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_sweep() {
        let sweep = parse_sweep("vacancy_rate:0.02:0.10:0.02").unwrap();
        assert_eq!(sweep.variable, SensitivityVariable::VacancyRate);
        assert_eq!(sweep.min, dec!(0.02));
        assert_eq!(sweep.step, dec!(0.02));
        assert!(parse_sweep("vacancy_rate:0.02").is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_name::<Metric>("dscr").unwrap(), Metric::Dscr);
        assert!(parse_name::<Metric>("sharpe").is_err());
        assert_eq!(parse_range("-0.05:0.2").unwrap(), (dec!(-0.05), dec!(0.2)));
    }
}
