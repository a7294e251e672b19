use serde::{Deserialize, Serialize};

use crate::calendar::YearMonth;
use crate::error::CrdEngineError;
use crate::schedule::builder::LoanParameters;
use crate::CrdEngineResult;

/// A loan as supplied by the loan repository: parameters plus the identity
/// and property it is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRecord {
    pub id: String,
    pub label: String,
    pub property_id: String,
    pub property_name: String,
    #[serde(flatten)]
    pub parameters: LoanParameters,
    /// Last month the loan is considered running; `None` while still open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<YearMonth>,
}

impl LoanRecord {
    pub fn start_month(&self) -> YearMonth {
        self.parameters.start_date
    }

    /// Whether `month` falls inside `[start, end]`; an open end never closes.
    pub fn is_running_in(&self, month: YearMonth) -> bool {
        self.start_month() <= month && self.end_date.map_or(true, |end| month <= end)
    }

    /// Still running on or after `as_of`.
    pub fn is_active(&self, as_of: YearMonth) -> bool {
        self.end_date.map_or(true, |end| end >= as_of)
    }

    pub fn validate(&self) -> CrdEngineResult<()> {
        self.parameters.validate()?;
        if let Some(end) = self.end_date {
            if end < self.start_month() {
                return Err(CrdEngineError::InvalidLoanParameters {
                    field: "end_date".into(),
                    reason: format!("End date {end} precedes start date {}", self.start_month()),
                });
            }
        }
        Ok(())
    }
}

/// A loan left out of a computation, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLoan {
    pub loan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

impl SkippedLoan {
    pub fn from_error(loan_id: impl Into<String>, error: &CrdEngineError) -> Self {
        SkippedLoan {
            loan_id: loan_id.into(),
            field: error.field().map(str::to_string),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(end: Option<&str>) -> LoanRecord {
        LoanRecord {
            id: "L1".into(),
            label: "Main residence".into(),
            property_id: "P1".into(),
            property_name: "Rue des Lilas".into(),
            parameters: LoanParameters {
                principal: dec!(100000),
                annual_rate_pct: dec!(2),
                duration_months: 120,
                deferment_months: 0,
                insurance_pct: dec!(0),
                start_date: "2020-06".parse().unwrap(),
            },
            end_date: end.map(|e| e.parse().unwrap()),
        }
    }

    #[test]
    fn test_running_window() {
        let open = record(None);
        assert!(!open.is_running_in("2020-05".parse().unwrap()));
        assert!(open.is_running_in("2020-06".parse().unwrap()));
        assert!(open.is_running_in("2040-01".parse().unwrap()));

        let closed = record(Some("2023-12"));
        assert!(closed.is_running_in("2023-12".parse().unwrap()));
        assert!(!closed.is_running_in("2024-01".parse().unwrap()));
        assert!(closed.is_active("2023-12".parse().unwrap()));
        assert!(!closed.is_active("2024-02".parse().unwrap()));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let err = record(Some("2019-01")).validate().unwrap_err();
        assert_eq!(err.field(), Some("end_date"));
    }

    #[test]
    fn test_record_json_shape() {
        let rec: LoanRecord = serde_json::from_value(serde_json::json!({
            "id": "L9",
            "label": "Studio",
            "propertyId": "P4",
            "propertyName": "Quai Est",
            "principal": "85000",
            "annualRatePct": "1.2",
            "durationMonths": 180,
            "insurancePct": 0.25,
            "startDate": "2021-03-05",
            "endDate": null
        }))
        .unwrap();
        assert_eq!(rec.parameters.deferment_months, 0);
        assert_eq!(rec.end_date, None);
        assert_eq!(rec.start_month().to_string(), "2021-03");
    }

    #[test]
    fn test_skipped_loan_carries_field() {
        let err = CrdEngineError::InvalidLoanParameters {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        };
        let skipped = SkippedLoan::from_error("L2", &err);
        assert_eq!(skipped.field.as_deref(), Some("principal"));
        assert!(skipped.reason.contains("Principal must be positive"));
    }
}
