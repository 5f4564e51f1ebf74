use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropCalcError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PropCalcError {
    /// Shorthand for the most common validation failure.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PropCalcError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PropCalcError {
    fn from(e: serde_json::Error) -> Self {
        PropCalcError::SerializationError(e.to_string())
    }
}
