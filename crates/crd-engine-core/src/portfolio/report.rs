use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use super::aggregate::{aggregate, AggregatedReport};
use super::repository::{InMemoryLoanRepository, LoanQuery, LoanRepository};
use crate::calendar::YearMonth;
use crate::types::*;
use crate::CrdEngineResult;

/// Parameters of a portfolio report request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReportRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<YearMonth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<YearMonth>,
    /// Reference "current" month for defaults and activity filtering
    pub today: YearMonth,
}

/// Self-contained report input: raw loan objects plus the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioInput {
    pub loans: Vec<Value>,
    #[serde(flatten)]
    pub request: PortfolioReportRequest,
}

/// Fetch loans once from `repository` and aggregate them.
pub fn build_portfolio_report(
    repository: &dyn LoanRepository,
    request: &PortfolioReportRequest,
) -> CrdEngineResult<ComputationOutput<AggregatedReport>> {
    let start = Instant::now();

    let query = LoanQuery {
        property_id: request.property_id.clone(),
        active_only: request.active_only,
        as_of: request.today,
    };
    let fetch = repository.fetch_loans(&query)?;

    let mut report = aggregate(&fetch.loans, request.from, request.to, request.today)?;
    report.skipped_loans.splice(0..0, fetch.rejected);

    let warnings: Vec<String> = report
        .skipped_loans
        .iter()
        .map(|s| format!("Loan {} excluded: {}", s.loan_id, s.reason))
        .collect();

    tracing::info!(
        loans = report.summary.loan_count,
        skipped = report.skipped_loans.len(),
        months = report.crd_timeline.len(),
        "portfolio report built"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Per-loan amortisation schedules aggregated by month and property",
        &serde_json::json!({
            "propertyId": request.property_id,
            "activeOnly": request.active_only,
            "from": report.from.to_string(),
            "to": report.to.to_string(),
            "today": request.today.to_string(),
            "topCostlyLimit": super::aggregate::TOP_COSTLY_LIMIT,
        }),
        warnings,
        elapsed,
        report,
    ))
}

/// Build a report from loans supplied inline.
pub fn calculate_portfolio_report(
    input: &PortfolioInput,
) -> CrdEngineResult<ComputationOutput<AggregatedReport>> {
    let repository = InMemoryLoanRepository::from_json_values(input.loans.clone());
    build_portfolio_report(&repository, &input.request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrdEngineError;
    use crate::portfolio::repository::LoanFetch;
    use rust_decimal_macros::dec;
    use serde_json::json;

    struct DownRepository;

    impl LoanRepository for DownRepository {
        fn fetch_loans(&self, _query: &LoanQuery) -> CrdEngineResult<LoanFetch> {
            Err(CrdEngineError::RepositoryUnavailable("connection refused".into()))
        }
    }

    fn request() -> PortfolioReportRequest {
        PortfolioReportRequest {
            property_id: None,
            active_only: false,
            from: Some("2025-01".parse().unwrap()),
            to: Some("2025-02".parse().unwrap()),
            today: "2025-02".parse().unwrap(),
        }
    }

    #[test]
    fn test_repository_failure_propagates_distinctly() {
        let err = build_portfolio_report(&DownRepository, &request()).unwrap_err();
        assert!(matches!(err, CrdEngineError::RepositoryUnavailable(_)));
    }

    #[test]
    fn test_inline_input_merges_rejections() {
        let input: PortfolioInput = serde_json::from_value(json!({
            "loans": [
                {
                    "id": "L1", "label": "Flat", "propertyId": "P1", "propertyName": "Flat",
                    "principal": 1200, "annualRatePct": 0, "durationMonths": 12,
                    "startDate": "2025-01"
                },
                { "id": "L2", "label": "Broken", "startDate": "yesterday" },
                {
                    "id": "L3", "label": "Negative", "propertyId": "P1", "propertyName": "Flat",
                    "principal": -5, "annualRatePct": 1, "durationMonths": 12,
                    "startDate": "2025-01"
                }
            ],
            "from": "2025-01",
            "to": "2025-02",
            "today": "2025-02"
        }))
        .unwrap();

        let out = calculate_portfolio_report(&input).unwrap();
        let skipped: Vec<&str> = out.result.skipped_loans.iter().map(|s| s.loan_id.as_str()).collect();
        assert_eq!(skipped, vec!["L2", "L3"]);
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.result.crd_by_property[0].crd, dec!(1000));
        assert_eq!(out.result.summary.loan_count, 1);
    }
}
