use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrdEngineError {
    #[error("Invalid loan parameters: {field}: {reason}")]
    InvalidLoanParameters { field: String, reason: String },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Loan repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CrdEngineError {
    /// Field name carried by validation errors, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            CrdEngineError::InvalidLoanParameters { field, .. }
            | CrdEngineError::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CrdEngineError {
    fn from(e: serde_json::Error) -> Self {
        CrdEngineError::SerializationError(e.to_string())
    }
}
