use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::calendar::YearMonth;
use crate::error::CrdEngineError;
use crate::time_value::{
    checked_product, checked_total, monthly_rate_from_annual_pct, round_currency, steady_payment,
    CURRENCY_TOLERANCE,
};
use crate::types::*;
use crate::CrdEngineResult;

/// Upper bound on loan length (100 years).
pub const MAX_DURATION_MONTHS: u32 = 1200;

/// Largest principal accepted. Keeps every schedule and portfolio total far
/// inside the Decimal range.
pub const MAX_PRINCIPAL: Money = dec!(1000000000000000);

/// Largest annual interest or insurance rate accepted, in percent.
pub const MAX_RATE_PCT: Decimal = dec!(1000);

/// Parameters of a single mortgage-style loan.
///
/// Rates are percentages as entered by users (3 = 3% a year), not decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanParameters {
    /// Amount borrowed
    pub principal: Money,
    /// Nominal annual interest rate, in percent
    pub annual_rate_pct: Decimal,
    /// Total length of the loan, deferment included
    pub duration_months: u32,
    /// Leading interest-only months
    #[serde(default)]
    pub deferment_months: u32,
    /// Annual insurance rate on the original principal, in percent
    #[serde(default)]
    pub insurance_pct: Decimal,
    /// Month of the first instalment; any day component is ignored
    pub start_date: YearMonth,
}

impl LoanParameters {
    /// Reject parameters that cannot produce a meaningful schedule.
    pub fn validate(&self) -> CrdEngineResult<()> {
        if self.principal <= Decimal::ZERO {
            return Err(invalid("principal", "Principal must be positive"));
        }
        if self.principal > MAX_PRINCIPAL {
            return Err(invalid(
                "principal",
                &format!("Principal cannot exceed {MAX_PRINCIPAL}"),
            ));
        }
        if round_currency(self.principal) != self.principal {
            return Err(invalid("principal", "Principal cannot carry fractions of a cent"));
        }
        if self.annual_rate_pct < Decimal::ZERO {
            return Err(invalid("annual_rate_pct", "Interest rate cannot be negative"));
        }
        if self.insurance_pct < Decimal::ZERO {
            return Err(invalid("insurance_pct", "Insurance rate cannot be negative"));
        }
        if self.annual_rate_pct > MAX_RATE_PCT {
            return Err(invalid(
                "annual_rate_pct",
                &format!("Interest rate cannot exceed {MAX_RATE_PCT}%"),
            ));
        }
        if self.insurance_pct > MAX_RATE_PCT {
            return Err(invalid(
                "insurance_pct",
                &format!("Insurance rate cannot exceed {MAX_RATE_PCT}%"),
            ));
        }
        if self.duration_months == 0 {
            return Err(invalid("duration_months", "Duration must be at least 1 month"));
        }
        if self.duration_months > MAX_DURATION_MONTHS {
            return Err(invalid(
                "duration_months",
                &format!("Duration cannot exceed {MAX_DURATION_MONTHS} months"),
            ));
        }
        if self.deferment_months > self.duration_months {
            return Err(invalid(
                "deferment_months",
                "Deferment cannot be longer than the loan duration",
            ));
        }
        Ok(())
    }

    pub fn monthly_rate(&self) -> Rate {
        monthly_rate_from_annual_pct(self.annual_rate_pct)
    }

    pub fn monthly_insurance_rate(&self) -> Rate {
        monthly_rate_from_annual_pct(self.insurance_pct)
    }

    /// Calendar month of the last instalment.
    pub fn end_month(&self) -> YearMonth {
        self.start_date.add_months(self.duration_months.saturating_sub(1))
    }
}

fn invalid(field: &str, reason: &str) -> CrdEngineError {
    CrdEngineError::InvalidLoanParameters {
        field: field.into(),
        reason: reason.into(),
    }
}

/// One month of a repayment schedule. All amounts are rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    /// 1-based instalment number
    pub month: u32,
    pub calendar_month: YearMonth,
    pub payment_principal: Money,
    pub payment_interest: Money,
    pub payment_insurance: Money,
    pub payment_total: Money,
    /// Capital still due after this instalment
    pub remaining_capital: Money,
    pub cumulative_interest: Money,
    pub cumulative_insurance: Money,
}

/// Ordered rows for one loan, month 1 first.
pub type Schedule = Vec<ScheduleRow>;

/// Build the month-by-month repayment schedule of a loan.
///
/// The steady payment is sized over the full duration even when the loan
/// opens with a deferment, so a deferred loan carries its unamortised capital
/// into the last instalment. The last row always settles the remaining capital.
pub fn build_schedule(params: &LoanParameters) -> CrdEngineResult<Schedule> {
    params.validate()?;

    let monthly_rate = params.monthly_rate();
    let payment = round_currency(steady_payment(
        params.principal,
        monthly_rate,
        params.duration_months,
    )?);
    let insurance = round_currency(checked_product(
        params.principal,
        params.monthly_insurance_rate(),
        "monthly insurance",
    )?);

    let mut rows = Vec::with_capacity(params.duration_months as usize);
    let mut remaining = params.principal;
    let mut cumulative_interest = Decimal::ZERO;
    let mut cumulative_insurance = Decimal::ZERO;

    for month in 1..=params.duration_months {
        let interest = round_currency(checked_product(remaining, monthly_rate, "monthly interest")?);

        let principal_paid = if month == params.duration_months {
            remaining
        } else if month <= params.deferment_months {
            Decimal::ZERO
        } else {
            let amortised = (payment - interest).max(Decimal::ZERO);
            if remaining - amortised < CURRENCY_TOLERANCE {
                remaining
            } else {
                amortised
            }
        };

        remaining -= principal_paid;
        cumulative_interest = checked_total(cumulative_interest, interest, "cumulative interest")?;
        cumulative_insurance = checked_total(cumulative_insurance, insurance, "cumulative insurance")?;
        let payment_total = checked_total(principal_paid, interest, "instalment total")
            .and_then(|partial| checked_total(partial, insurance, "instalment total"))?;

        rows.push(ScheduleRow {
            month,
            calendar_month: params.start_date.add_months(month - 1),
            payment_principal: principal_paid,
            payment_interest: interest,
            payment_insurance: insurance,
            payment_total,
            remaining_capital: remaining,
            cumulative_interest,
            cumulative_insurance,
        });
    }

    tracing::debug!(
        principal = %params.principal,
        duration_months = params.duration_months,
        deferment_months = params.deferment_months,
        steady_payment = %payment,
        "built repayment schedule"
    );

    Ok(rows)
}

/// Lifetime totals of one loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    /// Rounded principal + interest instalment outside deferment
    pub steady_payment: Money,
    pub monthly_insurance: Money,
    pub total_interest: Money,
    pub total_insurance: Money,
    /// Interest plus insurance over the life of the loan
    pub total_cost: Money,
    pub first_month: YearMonth,
    pub last_month: YearMonth,
}

/// Schedule plus its summary, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutput {
    pub summary: LoanSummary,
    pub rows: Vec<ScheduleRow>,
}

/// Input for a full schedule request, optionally restricted to a month window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[serde(flatten)]
    pub loan: LoanParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<YearMonth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<YearMonth>,
}

/// Summarise an already-built schedule.
pub fn summarize(params: &LoanParameters, schedule: &[ScheduleRow]) -> CrdEngineResult<LoanSummary> {
    let last = schedule
        .last()
        .ok_or_else(|| CrdEngineError::InvalidInput {
            field: "schedule".into(),
            reason: "Cannot summarise an empty schedule".into(),
        })?;

    Ok(LoanSummary {
        steady_payment: round_currency(steady_payment(
            params.principal,
            params.monthly_rate(),
            params.duration_months,
        )?),
        monthly_insurance: round_currency(checked_product(
            params.principal,
            params.monthly_insurance_rate(),
            "monthly insurance",
        )?),
        total_interest: last.cumulative_interest,
        total_insurance: last.cumulative_insurance,
        total_cost: checked_total(last.cumulative_interest, last.cumulative_insurance, "total cost")?,
        first_month: params.start_date,
        last_month: last.calendar_month,
    })
}

/// Build a schedule, summarise it and wrap it in the standard envelope.
///
/// The summary always covers the whole loan; `from`/`to` only trim the rows
/// returned.
pub fn amortize(request: &ScheduleRequest) -> CrdEngineResult<ComputationOutput<ScheduleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let params = &request.loan;

    let schedule = build_schedule(params)?;
    let summary = summarize(params, &schedule)?;

    if let Some(last) = schedule.last() {
        let regular = summary.steady_payment - last.payment_interest;
        if last.payment_principal - regular > CURRENCY_TOLERANCE && params.deferment_months > 0 {
            warnings.push(format!(
                "Deferment of {} months leaves {} of capital settled by the final instalment",
                params.deferment_months,
                last.payment_principal - regular.max(Decimal::ZERO)
            ));
        }
    }

    let rows = super::query::slice_schedule(&schedule, request.from, request.to).to_vec();

    let output = ScheduleOutput { summary, rows };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fixed annuity amortisation with interest-only deferment and flat insurance",
        &serde_json::json!({
            "principal": params.principal.to_string(),
            "annualRatePct": params.annual_rate_pct.to_string(),
            "durationMonths": params.duration_months,
            "defermentMonths": params.deferment_months,
            "insurancePct": params.insurance_pct.to_string(),
            "start": params.start_date.to_string(),
            "rounding": "2dp half away from zero, per row",
        }),
        warnings,
        elapsed,
        output,
    ))
}
