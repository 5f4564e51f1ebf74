pub mod amortization;
pub mod analysis;
pub mod error;
pub mod exit;
pub mod irr;
pub mod projection;
pub mod time_value;
pub mod types;

#[cfg(feature = "development")]
pub mod development;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

pub use error::PropCalcError;
pub use types::*;

/// Standard result type for all propcalc operations
pub type PropCalcResult<T> = Result<T, PropCalcError>;
