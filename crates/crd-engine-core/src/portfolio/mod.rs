pub mod aggregate;
pub mod loan;
pub mod report;
pub mod repository;

pub use aggregate::{aggregate, AggregatedReport, CostlyLoan, CrdPoint, PropertyCrd, PortfolioSummary};
pub use loan::{LoanRecord, SkippedLoan};
pub use report::{build_portfolio_report, calculate_portfolio_report, PortfolioInput, PortfolioReportRequest};
pub use repository::{InMemoryLoanRepository, JsonFileLoanRepository, LoanFetch, LoanQuery, LoanRepository};
