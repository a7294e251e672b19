//! Loan sources feeding the portfolio aggregator.
//!
//! Repositories hand back already-scoped loan records; the engine only reads
//! them. Records that cannot be decoded are returned alongside the good ones
//! so a single bad row never hides the rest of the portfolio.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::loan::{LoanRecord, SkippedLoan};
use crate::calendar::YearMonth;
use crate::error::CrdEngineError;
use crate::CrdEngineResult;

/// Which loans a report wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    /// Keep only loans still running at `as_of`
    #[serde(default)]
    pub active_only: bool,
    pub as_of: YearMonth,
}

impl LoanQuery {
    pub fn all(as_of: YearMonth) -> Self {
        LoanQuery {
            property_id: None,
            active_only: false,
            as_of,
        }
    }

    pub fn matches(&self, record: &LoanRecord) -> bool {
        let property_ok = self
            .property_id
            .as_deref()
            .map_or(true, |p| record.property_id == p);
        property_ok && (!self.active_only || record.is_active(self.as_of))
    }
}

/// Decoded loans plus the records that had to be rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanFetch {
    pub loans: Vec<LoanRecord>,
    pub rejected: Vec<SkippedLoan>,
}

impl LoanFetch {
    fn filtered(self, query: &LoanQuery) -> Self {
        LoanFetch {
            loans: self.loans.into_iter().filter(|l| query.matches(l)).collect(),
            rejected: self.rejected,
        }
    }
}

/// Source of loan records for a portfolio report.
pub trait LoanRepository: Send + Sync {
    /// Fetch loans matching `query`. Failing to reach the underlying store is
    /// a `RepositoryUnavailable` error; individual bad records are not.
    fn fetch_loans(&self, query: &LoanQuery) -> CrdEngineResult<LoanFetch>;
}

/// Decode raw JSON loan objects one by one.
pub fn decode_loan_records(entries: Vec<Value>) -> LoanFetch {
    let mut fetch = LoanFetch::default();
    for (idx, entry) in entries.into_iter().enumerate() {
        let loan_id = entry
            .get("id")
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| format!("#{idx}"));

        match serde_json::from_value::<LoanRecord>(entry) {
            Ok(record) => fetch.loans.push(record),
            Err(e) => {
                tracing::warn!(loan_id = %loan_id, error = %e, "rejecting malformed loan record");
                fetch.rejected.push(SkippedLoan {
                    loan_id,
                    field: None,
                    reason: format!("Malformed loan record: {e}"),
                });
            }
        }
    }
    fetch
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Repository over records already held by the caller.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoanRepository {
    contents: LoanFetch,
}

impl InMemoryLoanRepository {
    pub fn new(loans: Vec<LoanRecord>) -> Self {
        InMemoryLoanRepository {
            contents: LoanFetch {
                loans,
                rejected: Vec::new(),
            },
        }
    }

    /// Build from untyped JSON objects, rejecting the malformed ones.
    pub fn from_json_values(entries: Vec<Value>) -> Self {
        InMemoryLoanRepository {
            contents: decode_loan_records(entries),
        }
    }
}

impl LoanRepository for InMemoryLoanRepository {
    fn fetch_loans(&self, query: &LoanQuery) -> CrdEngineResult<LoanFetch> {
        Ok(self.contents.clone().filtered(query))
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// Repository reading a JSON array of loan objects from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileLoanRepository {
    file_path: PathBuf,
}

impl JsonFileLoanRepository {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        JsonFileLoanRepository {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn read_entries(&self) -> CrdEngineResult<Vec<Value>> {
        let contents = fs::read_to_string(&self.file_path).map_err(|e| {
            CrdEngineError::RepositoryUnavailable(format!(
                "cannot read '{}': {e}",
                self.file_path.display()
            ))
        })?;
        let document: Value = serde_json::from_str(&contents).map_err(|e| {
            CrdEngineError::RepositoryUnavailable(format!(
                "'{}' is not valid JSON: {e}",
                self.file_path.display()
            ))
        })?;

        match document {
            Value::Array(entries) => Ok(entries),
            Value::Object(mut map) => match map.remove("loans") {
                Some(Value::Array(entries)) => Ok(entries),
                _ => Err(CrdEngineError::RepositoryUnavailable(format!(
                    "'{}' has no \"loans\" array",
                    self.file_path.display()
                ))),
            },
            _ => Err(CrdEngineError::RepositoryUnavailable(format!(
                "'{}' must hold an array of loans",
                self.file_path.display()
            ))),
        }
    }
}

impl LoanRepository for JsonFileLoanRepository {
    fn fetch_loans(&self, query: &LoanQuery) -> CrdEngineResult<LoanFetch> {
        let entries = self.read_entries()?;
        tracing::debug!(path = %self.file_path.display(), records = entries.len(), "read loan file");
        Ok(decode_loan_records(entries).filtered(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn loan_json(id: &str, property: &str, end: Option<&str>) -> Value {
        json!({
            "id": id,
            "label": format!("Loan {id}"),
            "propertyId": property,
            "propertyName": format!("Property {property}"),
            "principal": 50000,
            "annualRatePct": 2.1,
            "durationMonths": 120,
            "startDate": "2021-01-01",
            "endDate": end
        })
    }

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_decode_isolates_bad_records() {
        let mut bad_date = loan_json("L2", "P1", None);
        bad_date["startDate"] = json!("2021-02-31");
        let fetch = decode_loan_records(vec![
            loan_json("L1", "P1", None),
            bad_date,
            json!({"label": "no id at all"}),
        ]);
        assert_eq!(fetch.loans.len(), 1);
        assert_eq!(fetch.rejected.len(), 2);
        assert_eq!(fetch.rejected[0].loan_id, "L2");
        assert_eq!(fetch.rejected[1].loan_id, "#2");
    }

    #[test]
    fn test_query_filters_property_and_activity() {
        let repo = InMemoryLoanRepository::from_json_values(vec![
            loan_json("L1", "P1", None),
            loan_json("L2", "P1", Some("2023-06")),
            loan_json("L3", "P2", None),
        ]);

        let all = repo.fetch_loans(&LoanQuery::all(ym("2025-01"))).unwrap();
        assert_eq!(all.loans.len(), 3);

        let query = LoanQuery {
            property_id: Some("P1".into()),
            active_only: true,
            as_of: ym("2025-01"),
        };
        let ids: Vec<String> = repo
            .fetch_loans(&query)
            .unwrap()
            .loans
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["L1"]);
    }

    #[test]
    fn test_json_file_repository_reads_array_and_wrapped_forms() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json!([loan_json("L1", "P1", None)])).unwrap();
        let repo = JsonFileLoanRepository::new(file.path());
        let fetch = repo.fetch_loans(&LoanQuery::all(ym("2025-01"))).unwrap();
        assert_eq!(fetch.loans[0].id, "L1");

        let mut wrapped = tempfile::NamedTempFile::new().unwrap();
        write!(wrapped, "{}", json!({"loans": [loan_json("L7", "P3", None)]})).unwrap();
        let repo = JsonFileLoanRepository::new(wrapped.path());
        let fetch = repo.fetch_loans(&LoanQuery::all(ym("2025-01"))).unwrap();
        assert_eq!(fetch.loans[0].property_id, "P3");
    }

    #[test]
    fn test_missing_file_is_repository_unavailable() {
        let repo = JsonFileLoanRepository::new("/definitely/not/here/loans.json");
        let err = repo.fetch_loans(&LoanQuery::all(ym("2025-01"))).unwrap_err();
        assert!(matches!(err, CrdEngineError::RepositoryUnavailable(_)));
    }

    #[test]
    fn test_garbage_file_is_repository_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let repo = JsonFileLoanRepository::new(file.path());
        let err = repo.fetch_loans(&LoanQuery::all(ym("2025-01"))).unwrap_err();
        assert!(matches!(err, CrdEngineError::RepositoryUnavailable(_)));
    }
}
