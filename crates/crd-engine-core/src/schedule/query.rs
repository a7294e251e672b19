use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::builder::{build_schedule, LoanParameters, ScheduleRow};
use crate::calendar::YearMonth;
use crate::error::CrdEngineError;
use crate::types::*;
use crate::CrdEngineResult;

/// Capital remaining due after instalment `month_index` (1-based).
///
/// Indices at or below zero report the first row; indices past the end
/// report a fully repaid loan.
pub fn crd_at(schedule: &[ScheduleRow], month_index: i64) -> Money {
    let Some(first) = schedule.first() else {
        return Decimal::ZERO;
    };
    if month_index <= 0 {
        return first.remaining_capital;
    }
    usize::try_from(month_index - 1)
        .ok()
        .and_then(|idx| schedule.get(idx))
        .map_or(Decimal::ZERO, |row| row.remaining_capital)
}

/// Capital remaining due as of a calendar month: the last row on or before
/// `month`, or the first row when `month` precedes the schedule.
pub fn crd_at_date(schedule: &[ScheduleRow], month: YearMonth) -> Money {
    let Some(first) = schedule.first() else {
        return Decimal::ZERO;
    };
    let upto = schedule.partition_point(|row| row.calendar_month <= month);
    if upto == 0 {
        first.remaining_capital
    } else {
        schedule[upto - 1].remaining_capital
    }
}

/// Rows with `from <= calendar_month <= to`. A missing bound is open.
pub fn slice_schedule(
    schedule: &[ScheduleRow],
    from: Option<YearMonth>,
    to: Option<YearMonth>,
) -> &[ScheduleRow] {
    let start = from.map_or(0, |f| schedule.partition_point(|row| row.calendar_month < f));
    let end = to.map_or(schedule.len(), |t| {
        schedule.partition_point(|row| row.calendar_month <= t)
    });
    if start >= end {
        &[]
    } else {
        &schedule[start..end]
    }
}

/// A point-in-time CRD question about one loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdQueryInput {
    #[serde(flatten)]
    pub loan: LoanParameters,
    /// 1-based instalment number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_index: Option<i64>,
    /// Calendar month
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<YearMonth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdQueryOutput {
    pub crd: Money,
    /// Instalment the answer was read from, if it falls inside the schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_month: Option<YearMonth>,
    pub principal: Money,
    /// Share of the original principal already repaid (0..=1)
    pub repaid_ratio: Decimal,
}

/// Answer a single CRD query by month index or calendar month.
pub fn query_crd(input: &CrdQueryInput) -> CrdEngineResult<ComputationOutput<CrdQueryOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let schedule = build_schedule(&input.loan)?;

    let (crd, row) = match (input.month_index, input.at) {
        (Some(_), Some(_)) => {
            return Err(CrdEngineError::InvalidInput {
                field: "month_index".into(),
                reason: "Provide either a month index or a calendar month, not both".into(),
            });
        }
        (Some(idx), None) => {
            if idx <= 0 {
                warnings.push(format!(
                    "Month index {idx} precedes the first instalment; reporting instalment 1"
                ));
            }
            let row = idx
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| schedule.get(i));
            (crd_at(&schedule, idx), row)
        }
        (None, Some(month)) => {
            let upto = schedule.partition_point(|r| r.calendar_month <= month);
            if upto == 0 {
                warnings.push(format!(
                    "{month} precedes the first instalment; reporting instalment 1"
                ));
            }
            (crd_at_date(&schedule, month), upto.checked_sub(1).and_then(|i| schedule.get(i)))
        }
        (None, None) => {
            return Err(CrdEngineError::InvalidInput {
                field: "month_index".into(),
                reason: "A month index or a calendar month is required".into(),
            });
        }
    };

    let principal = input.loan.principal;
    let output = CrdQueryOutput {
        crd,
        month_index: row.map(|r| r.month),
        calendar_month: row.map(|r| r.calendar_month),
        principal,
        repaid_ratio: ((principal - crd) / principal).round_dp(4),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Capital remaining due read from the amortisation schedule",
        &serde_json::json!({
            "monthIndex": input.month_index,
            "at": input.at.map(|m| m.to_string()),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> LoanParameters {
        LoanParameters {
            principal: dec!(12000),
            annual_rate_pct: Decimal::ZERO,
            duration_months: 12,
            deferment_months: 0,
            insurance_pct: Decimal::ZERO,
            start_date: "2024-03".parse().unwrap(),
        }
    }

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_crd_at_index_bounds() {
        let schedule = build_schedule(&params()).unwrap();
        assert_eq!(crd_at(&schedule, 0), dec!(11000));
        assert_eq!(crd_at(&schedule, -3), dec!(11000));
        assert_eq!(crd_at(&schedule, 1), dec!(11000));
        assert_eq!(crd_at(&schedule, 6), dec!(6000));
        assert_eq!(crd_at(&schedule, 12), Decimal::ZERO);
        assert_eq!(crd_at(&schedule, 13), Decimal::ZERO);
        assert_eq!(crd_at(&[], 1), Decimal::ZERO);
    }

    #[test]
    fn test_crd_at_date() {
        let schedule = build_schedule(&params()).unwrap();
        assert_eq!(crd_at_date(&schedule, ym("2024-03")), schedule[0].remaining_capital);
        assert_eq!(crd_at_date(&schedule, ym("2023-01")), schedule[0].remaining_capital);
        assert_eq!(crd_at_date(&schedule, ym("2024-12")), dec!(2000));
        assert_eq!(crd_at_date(&schedule, ym("2025-03")), Decimal::ZERO);
        assert_eq!(crd_at_date(&schedule, ym("2030-01")), Decimal::ZERO);
    }

    #[test]
    fn test_slice_schedule_bounds() {
        let schedule = build_schedule(&params()).unwrap();

        let window = slice_schedule(&schedule, Some(ym("2024-06")), Some(ym("2024-08")));
        let months: Vec<u32> = window.iter().map(|r| r.month).collect();
        assert_eq!(months, vec![4, 5, 6]);

        assert_eq!(slice_schedule(&schedule, None, None).len(), 12);
        assert_eq!(slice_schedule(&schedule, Some(ym("2025-01")), None).len(), 2);
        assert_eq!(slice_schedule(&schedule, None, Some(ym("2024-04"))).len(), 2);
        assert!(slice_schedule(&schedule, Some(ym("2024-08")), Some(ym("2024-06"))).is_empty());
        assert!(slice_schedule(&schedule, Some(ym("2026-01")), None).is_empty());
    }

    #[test]
    fn test_query_crd_by_calendar_month() {
        let input = CrdQueryInput {
            loan: params(),
            month_index: None,
            at: Some(ym("2024-08")),
        };
        let out = query_crd(&input).unwrap();
        assert_eq!(out.result.crd, dec!(6000));
        assert_eq!(out.result.month_index, Some(6));
        assert_eq!(out.result.repaid_ratio, dec!(0.5));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_query_crd_before_start_warns() {
        let input = CrdQueryInput {
            loan: params(),
            month_index: Some(0),
            at: None,
        };
        let out = query_crd(&input).unwrap();
        assert_eq!(out.result.crd, dec!(11000));
        assert_eq!(out.result.month_index, None);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_query_crd_requires_exactly_one_selector() {
        let mut input = CrdQueryInput {
            loan: params(),
            month_index: None,
            at: None,
        };
        assert!(query_crd(&input).is_err());
        input.month_index = Some(2);
        input.at = Some(ym("2024-04"));
        assert!(query_crd(&input).is_err());
    }
}
