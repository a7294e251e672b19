pub mod calendar;
pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "schedule")]
pub mod schedule;

#[cfg(feature = "portfolio")]
pub mod portfolio;

pub use calendar::YearMonth;
pub use error::CrdEngineError;
pub use types::*;

/// Standard result type for all crd-engine operations
pub type CrdEngineResult<T> = Result<T, CrdEngineError>;
