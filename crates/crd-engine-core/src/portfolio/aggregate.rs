use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::loan::{LoanRecord, SkippedLoan};
use crate::calendar::YearMonth;
use crate::error::CrdEngineError;
use crate::schedule::builder::{build_schedule, Schedule};
use crate::schedule::query::crd_at_date;
use crate::time_value::checked_total;
use crate::types::Money;
use crate::CrdEngineResult;

/// Maximum number of entries in the costliest-loans ranking.
pub const TOP_COSTLY_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Portfolio CRD at one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrdPoint {
    pub month: YearMonth,
    #[serde(with = "rust_decimal::serde::float")]
    pub crd: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCrd {
    pub property_id: String,
    pub property_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub crd: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostlyLoan {
    pub loan_id: String,
    pub label: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_interest: Money,
}

/// Headline totals over the loans that made it into the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub loan_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_principal: Money,
    /// CRD at the report's end month
    #[serde(with = "rust_decimal::serde::float")]
    pub total_crd: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_interest: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_insurance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReport {
    pub from: YearMonth,
    pub to: YearMonth,
    pub crd_timeline: Vec<CrdPoint>,
    pub crd_by_property: Vec<PropertyCrd>,
    pub top_costly_loans: Vec<CostlyLoan>,
    pub skipped_loans: Vec<SkippedLoan>,
    pub summary: PortfolioSummary,
}

/// Inclusive month window a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub from: YearMonth,
    pub to: YearMonth,
}

impl ReportRange {
    /// Fill in defaults relative to `today`: January of the current year for
    /// `from`, the current month for `to`.
    pub fn resolve(
        from: Option<YearMonth>,
        to: Option<YearMonth>,
        today: YearMonth,
    ) -> CrdEngineResult<Self> {
        let to = to.unwrap_or(today);
        let from = from.unwrap_or_else(|| today.start_of_year());
        if from > to {
            return Err(CrdEngineError::InvalidInput {
                field: "from".into(),
                reason: format!("Report start {from} is after report end {to}"),
            });
        }
        Ok(ReportRange { from, to })
    }

    pub fn months(&self) -> impl Iterator<Item = YearMonth> {
        YearMonth::range_inclusive(self.from, self.to)
    }
}

/// A loan whose schedule has been built once and is queried many times.
struct BuiltLoan<'a> {
    record: &'a LoanRecord,
    schedule: Schedule,
}

impl BuiltLoan<'_> {
    fn total_interest(&self) -> Money {
        self.schedule
            .last()
            .map_or(Decimal::ZERO, |row| row.cumulative_interest)
    }

    fn total_insurance(&self) -> Money {
        self.schedule
            .last()
            .map_or(Decimal::ZERO, |row| row.cumulative_insurance)
    }
}

fn build_loan(record: &LoanRecord) -> Result<BuiltLoan<'_>, SkippedLoan> {
    record
        .validate()
        .and_then(|_| build_schedule(&record.parameters))
        .map(|schedule| BuiltLoan { record, schedule })
        .map_err(|e| SkippedLoan::from_error(&record.id, &e))
}

#[cfg(feature = "parallel")]
fn build_all(loans: &[LoanRecord]) -> Vec<Result<BuiltLoan<'_>, SkippedLoan>> {
    use rayon::prelude::*;
    loans.par_iter().map(build_loan).collect()
}

#[cfg(not(feature = "parallel"))]
fn build_all(loans: &[LoanRecord]) -> Vec<Result<BuiltLoan<'_>, SkippedLoan>> {
    loans.iter().map(build_loan).collect()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregate a set of loans into timeline, per-property and cost rankings.
///
/// `today` stands in for the clock: it supplies the default range and is
/// never read from the system. Malformed loans are reported in
/// `skipped_loans` and left out of every figure.
pub fn aggregate(
    loans: &[LoanRecord],
    from: Option<YearMonth>,
    to: Option<YearMonth>,
    today: YearMonth,
) -> CrdEngineResult<AggregatedReport> {
    let range = ReportRange::resolve(from, to, today)?;

    let mut built = Vec::with_capacity(loans.len());
    let mut skipped = Vec::new();
    for outcome in build_all(loans) {
        match outcome {
            Ok(loan) => built.push(loan),
            Err(skip) => {
                tracing::warn!(loan_id = %skip.loan_id, reason = %skip.reason, "skipping loan");
                skipped.push(skip);
            }
        }
    }

    tracing::debug!(
        from = %range.from,
        to = %range.to,
        loans = built.len(),
        skipped = skipped.len(),
        "aggregating portfolio"
    );

    let report = AggregatedReport {
        from: range.from,
        to: range.to,
        crd_timeline: crd_timeline(&built, &range)?,
        crd_by_property: crd_by_property(&built, range.to)?,
        top_costly_loans: top_costly_loans(&built),
        summary: summarize(&built, range.to)?,
        skipped_loans: skipped,
    };

    Ok(report)
}

/// CRD of `loan` at `month`, zero unless the loan is running then.
fn running_crd(loan: &BuiltLoan<'_>, month: YearMonth) -> Money {
    if loan.record.is_running_in(month) {
        crd_at_date(&loan.schedule, month)
    } else {
        Decimal::ZERO
    }
}

fn sum_checked<I>(amounts: I, context: &str) -> CrdEngineResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| checked_total(acc, amount, context))
}

fn crd_timeline(loans: &[BuiltLoan<'_>], range: &ReportRange) -> CrdEngineResult<Vec<CrdPoint>> {
    range
        .months()
        .map(|month| {
            let crd = sum_checked(loans.iter().map(|loan| running_crd(loan, month)), "monthly CRD")?;
            Ok(CrdPoint { month, crd })
        })
        .collect()
}

fn crd_by_property(loans: &[BuiltLoan<'_>], at: YearMonth) -> CrdEngineResult<Vec<PropertyCrd>> {
    let mut by_property: BTreeMap<&str, PropertyCrd> = BTreeMap::new();

    for loan in loans {
        let crd = running_crd(loan, at);
        if crd <= Decimal::ZERO {
            continue;
        }
        let entry = by_property
            .entry(loan.record.property_id.as_str())
            .or_insert_with(|| PropertyCrd {
                property_id: loan.record.property_id.clone(),
                property_name: loan.record.property_name.clone(),
                crd: Decimal::ZERO,
            });
        entry.crd = checked_total(entry.crd, crd, "property CRD")?;
    }

    let mut entries: Vec<PropertyCrd> = by_property
        .into_values()
        .filter(|p| p.crd > Decimal::ZERO)
        .collect();
    entries.sort_by(|a, b| descending(a.crd, b.crd).then_with(|| a.property_id.cmp(&b.property_id)));
    Ok(entries)
}

fn top_costly_loans(loans: &[BuiltLoan<'_>]) -> Vec<CostlyLoan> {
    let mut ranked: Vec<CostlyLoan> = loans
        .iter()
        .map(|loan| CostlyLoan {
            loan_id: loan.record.id.clone(),
            label: loan.record.label.clone(),
            total_interest: loan.total_interest(),
        })
        .filter(|c| c.total_interest > Decimal::ZERO)
        .collect();
    ranked.sort_by(|a, b| {
        descending(a.total_interest, b.total_interest).then_with(|| a.loan_id.cmp(&b.loan_id))
    });
    ranked.truncate(TOP_COSTLY_LIMIT);
    ranked
}

/// Portfolio totals. `total_crd` uses the same running-loan rule as the
/// timeline, so it always equals the timeline's last point.
fn summarize(loans: &[BuiltLoan<'_>], at: YearMonth) -> CrdEngineResult<PortfolioSummary> {
    Ok(PortfolioSummary {
        loan_count: loans.len(),
        total_principal: sum_checked(loans.iter().map(|l| l.record.parameters.principal), "total principal")?,
        total_crd: sum_checked(loans.iter().map(|l| running_crd(l, at)), "total CRD")?,
        total_interest: sum_checked(loans.iter().map(BuiltLoan::total_interest), "total interest")?,
        total_insurance: sum_checked(loans.iter().map(BuiltLoan::total_insurance), "total insurance")?,
    })
}

fn descending(a: Money, b: Money) -> Ordering {
    b.cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::builder::LoanParameters;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    /// Zero-rate loan: CRD falls by `principal / months` each month.
    fn straight_loan(id: &str, property: &str, principal: Money, months: u32, start: &str) -> LoanRecord {
        LoanRecord {
            id: id.into(),
            label: format!("Loan {id}"),
            property_id: property.into(),
            property_name: format!("Property {property}"),
            parameters: LoanParameters {
                principal,
                annual_rate_pct: Decimal::ZERO,
                duration_months: months,
                deferment_months: 0,
                insurance_pct: Decimal::ZERO,
                start_date: ym(start),
            },
            end_date: None,
        }
    }

    #[test]
    fn test_range_defaults_to_current_year() {
        let range = ReportRange::resolve(None, None, ym("2026-10")).unwrap();
        assert_eq!(range.from, ym("2026-01"));
        assert_eq!(range.to, ym("2026-10"));
        assert_eq!(range.months().count(), 10);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = ReportRange::resolve(Some(ym("2026-05")), Some(ym("2026-01")), ym("2026-10"));
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_portfolio_is_not_an_error() {
        let report = aggregate(&[], Some(ym("2025-01")), Some(ym("2025-03")), ym("2025-03")).unwrap();
        assert_eq!(report.crd_timeline.len(), 3);
        assert!(report.crd_timeline.iter().all(|p| p.crd.is_zero()));
        assert!(report.crd_by_property.is_empty());
        assert!(report.top_costly_loans.is_empty());
        assert!(report.skipped_loans.is_empty());
        assert_eq!(report.summary, PortfolioSummary::default());
    }

    #[test]
    fn test_timeline_only_counts_running_loans() {
        let loans = vec![
            straight_loan("A", "P1", dec!(1200), 12, "2025-01"),
            straight_loan("B", "P2", dec!(600), 6, "2025-03"),
        ];
        let report = aggregate(&loans, Some(ym("2024-12")), Some(ym("2025-04")), ym("2025-04")).unwrap();
        let crds: Vec<Money> = report.crd_timeline.iter().map(|p| p.crd).collect();
        // Dec: nothing running. Jan/Feb: A only. Mar/Apr: A + B.
        assert_eq!(crds, vec![dec!(0), dec!(1100), dec!(1000), dec!(900) + dec!(500), dec!(800) + dec!(400)]);
    }

    #[test]
    fn test_closed_loan_drops_out_of_timeline() {
        let mut sold = straight_loan("A", "P1", dec!(1200), 12, "2025-01");
        sold.end_date = Some(ym("2025-02"));
        let report = aggregate(&[sold], Some(ym("2025-01")), Some(ym("2025-03")), ym("2025-03")).unwrap();
        let crds: Vec<Money> = report.crd_timeline.iter().map(|p| p.crd).collect();
        assert_eq!(crds, vec![dec!(1100), dec!(1000), dec!(0)]);
    }

    #[test]
    fn test_summary_crd_matches_last_timeline_point() {
        let mut sold = straight_loan("A", "P1", dec!(1200), 12, "2025-01");
        sold.end_date = Some(ym("2025-02"));
        let not_started = straight_loan("B", "P2", dec!(1200), 12, "2026-01");
        let running = straight_loan("C", "P3", dec!(600), 6, "2025-01");

        let report = aggregate(
            &[sold, not_started, running],
            Some(ym("2025-01")),
            Some(ym("2025-03")),
            ym("2025-03"),
        )
        .unwrap();

        let last = report.crd_timeline.last().unwrap();
        assert_eq!(report.summary.total_crd, last.crd);
        assert_eq!(report.summary.total_crd, dec!(300));
        let ids: Vec<&str> = report.crd_by_property.iter().map(|p| p.property_id.as_str()).collect();
        assert_eq!(ids, vec!["P3"]);
        assert_eq!(report.summary.loan_count, 3);
    }

    #[test]
    fn test_property_totals_sorted_descending_with_id_tiebreak() {
        let loans = vec![
            straight_loan("A", "P2", dec!(1200), 12, "2025-01"),
            straight_loan("B", "P1", dec!(1200), 12, "2025-01"),
            straight_loan("C", "P3", dec!(2400), 12, "2025-01"),
            straight_loan("D", "P4", dec!(100), 1, "2024-01"),
        ];
        let report = aggregate(&loans, Some(ym("2025-01")), Some(ym("2025-06")), ym("2025-06")).unwrap();
        let ids: Vec<&str> = report.crd_by_property.iter().map(|p| p.property_id.as_str()).collect();
        // P4's loan is repaid, so it is omitted
        assert_eq!(ids, vec!["P3", "P1", "P2"]);
        assert_eq!(report.crd_by_property[0].crd, dec!(1200));
        assert_eq!(report.crd_by_property[1].property_name, "Property P1");
    }

    #[test]
    fn test_malformed_loan_is_skipped_not_fatal() {
        let mut broken = straight_loan("BAD", "P1", dec!(1000), 10, "2025-01");
        broken.parameters.duration_months = 0;
        let loans = vec![broken, straight_loan("OK", "P1", dec!(1000), 10, "2025-01")];

        let report = aggregate(&loans, Some(ym("2025-01")), Some(ym("2025-01")), ym("2025-01")).unwrap();
        assert_eq!(report.skipped_loans.len(), 1);
        assert_eq!(report.skipped_loans[0].loan_id, "BAD");
        assert_eq!(report.skipped_loans[0].field.as_deref(), Some("duration_months"));
        assert_eq!(report.summary.loan_count, 1);
        assert_eq!(report.crd_timeline[0].crd, dec!(900));
    }

    #[test]
    fn test_oversized_loans_are_skipped_not_fatal() {
        let mut huge = straight_loan("HUGE1", "P1", dec!(50000000000000000000000000000), 12, "2025-01");
        huge.parameters.annual_rate_pct = dec!(5);
        let mut huge2 = huge.clone();
        huge2.id = "HUGE2".into();
        let loans = vec![huge, huge2, straight_loan("OK", "P2", dec!(1200), 12, "2025-01")];

        let report = aggregate(&loans, Some(ym("2025-01")), Some(ym("2025-01")), ym("2025-01")).unwrap();
        let skipped: Vec<&str> = report.skipped_loans.iter().map(|s| s.loan_id.as_str()).collect();
        assert_eq!(skipped, vec!["HUGE1", "HUGE2"]);
        assert_eq!(report.summary.total_crd, dec!(1100));
    }

    #[test]
    fn test_zero_interest_loans_not_ranked() {
        let loans = vec![straight_loan("A", "P1", dec!(1000), 10, "2025-01")];
        let report = aggregate(&loans, None, None, ym("2025-05")).unwrap();
        assert!(report.top_costly_loans.is_empty());
    }

    #[test]
    fn test_report_serialises_amounts_as_numbers() {
        let loans = vec![straight_loan("A", "P1", dec!(1200), 12, "2025-01")];
        let report = aggregate(&loans, Some(ym("2025-01")), Some(ym("2025-01")), ym("2025-01")).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["crdTimeline"][0]["month"], "2025-01");
        assert_eq!(json["crdTimeline"][0]["crd"], serde_json::json!(1100.0));
        assert_eq!(json["crdByProperty"][0]["propertyId"], "P1");
    }
}
