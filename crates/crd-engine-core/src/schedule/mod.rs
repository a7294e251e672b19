pub mod annual;
pub mod builder;
pub mod payment;
pub mod query;

pub use builder::{build_schedule, LoanParameters, Schedule, ScheduleRow};
pub use payment::calculate_monthly_payment;
pub use query::{crd_at, crd_at_date, slice_schedule};
