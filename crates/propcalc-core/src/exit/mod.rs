pub mod valuation;

#[cfg(feature = "strategies")]
pub mod strategies;

pub use valuation::{
    appreciation_exit_value, cap_rate_exit_value, evaluate_exit, net_sale_proceeds,
    ExitAssumptions, ExitProceeds, ExitValuation,
};
