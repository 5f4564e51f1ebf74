mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::amortization::AmortizeArgs;
use commands::deal::MaoArgs;
use commands::development::DevelopArgs;
use commands::irr::IrrArgs;
use commands::rental::RentalArgs;
use commands::sensitivity::{BreakEvenArgs, GridArgs, StressArgs, TornadoArgs};
use commands::strategies::ExitStrategiesArgs;

/// Real-estate investment calculators
#[derive(Parser)]
#[command(
    name = "propcalc",
    version,
    about = "Real-estate investment calculators",
    long_about = "A CLI for real-estate investment analysis with decimal precision. \
                  Projects rental cash flows with financing, refinance and exit, \
                  compares flip / hold / BRRRR / subdivide / wholesale exits, \
                  schedules phased developments, and runs break-even, stress and \
                  sensitivity analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Project rental cash flows with exit proceeds and levered IRR
    Rental(RentalArgs),
    /// Build a fixed-rate loan amortization schedule
    Amortize(AmortizeArgs),
    /// Solve the IRR (and optionally NPV) of a cash-flow vector
    Irr(IrrArgs),
    /// Compare exit strategies for one property
    ExitStrategies(ExitStrategiesArgs),
    /// Schedule a phased build-and-sell development
    Develop(DevelopArgs),
    /// Find the input value at which a metric crosses a threshold
    BreakEven(BreakEvenArgs),
    /// Re-run a scenario under downside shocks
    Stress(StressArgs),
    /// One-way sensitivity of a metric to every input
    Tornado(TornadoArgs),
    /// Two-way sensitivity table over two inputs
    SensitivityGrid(GridArgs),
    /// Maximum allowable offer screen for a flip
    Mao(MaoArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Rental(args) => commands::rental::run_rental(args),
        Commands::Amortize(args) => commands::amortization::run_amortize(args),
        Commands::Irr(args) => commands::irr::run_irr(args),
        Commands::ExitStrategies(args) => commands::strategies::run_exit_strategies(args),
        Commands::Develop(args) => commands::development::run_develop(args),
        Commands::BreakEven(args) => commands::sensitivity::run_break_even(args),
        Commands::Stress(args) => commands::sensitivity::run_stress(args),
        Commands::Tornado(args) => commands::sensitivity::run_tornado(args),
        Commands::SensitivityGrid(args) => commands::sensitivity::run_sensitivity_grid(args),
        Commands::Mao(args) => commands::deal::run_mao(args),
        Commands::Version => {
            println!("propcalc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
