use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::builder::{build_schedule, LoanParameters, ScheduleRow};
use crate::types::*;
use crate::CrdEngineResult;

/// Repayment totals for one calendar year of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualTotals {
    pub year: i32,
    pub instalments: u32,
    pub principal: Money,
    pub interest: Money,
    pub insurance: Money,
    pub total: Money,
    /// Capital due after the year's last instalment
    pub closing_capital: Money,
}

/// Roll a schedule up into calendar years, oldest first.
pub fn annual_breakdown(schedule: &[ScheduleRow]) -> Vec<AnnualTotals> {
    let mut years: Vec<AnnualTotals> = Vec::new();

    for row in schedule {
        let year = row.calendar_month.year();
        match years.last_mut() {
            Some(current) if current.year == year => {
                current.instalments += 1;
                current.principal += row.payment_principal;
                current.interest += row.payment_interest;
                current.insurance += row.payment_insurance;
                current.total += row.payment_total;
                current.closing_capital = row.remaining_capital;
            }
            _ => years.push(AnnualTotals {
                year,
                instalments: 1,
                principal: row.payment_principal,
                interest: row.payment_interest,
                insurance: row.payment_insurance,
                total: row.payment_total,
                closing_capital: row.remaining_capital,
            }),
        }
    }

    years
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualBreakdownOutput {
    pub years: Vec<AnnualTotals>,
    pub total_interest: Money,
    pub total_insurance: Money,
}

/// Build a schedule and return its per-year rollup in the standard envelope.
pub fn calculate_annual_breakdown(
    params: &LoanParameters,
) -> CrdEngineResult<ComputationOutput<AnnualBreakdownOutput>> {
    let start = Instant::now();
    let schedule = build_schedule(params)?;
    let years = annual_breakdown(&schedule);

    let total_interest = years.iter().map(|y| y.interest).sum::<Decimal>();
    let total_insurance = years.iter().map(|y| y.insurance).sum::<Decimal>();

    let mut warnings = Vec::new();
    if let Some(first) = years.first() {
        if first.instalments < 12 {
            warnings.push(format!(
                "{} is a partial year ({} instalments)",
                first.year, first.instalments
            ));
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Calendar-year rollup of the amortisation schedule",
        &serde_json::json!({
            "start": params.start_date.to_string(),
            "durationMonths": params.duration_months,
        }),
        warnings,
        elapsed,
        AnnualBreakdownOutput {
            years,
            total_interest,
            total_insurance,
        },
    ))
}
