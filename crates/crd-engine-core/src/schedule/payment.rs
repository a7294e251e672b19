use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::builder::LoanParameters;
use crate::time_value::{checked_product, round_currency, steady_payment};
use crate::types::*;
use crate::CrdEngineResult;

/// Steady monthly instalment: principal + interest + insurance.
///
/// Uses the same annuity function as the schedule builder, so with no
/// deferment this equals the first row's total.
pub fn calculate_monthly_payment(params: &LoanParameters) -> CrdEngineResult<Money> {
    let breakdown = payment_breakdown(params)?;
    Ok(breakdown.total)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPaymentOutput {
    pub principal_and_interest: Money,
    pub insurance: Money,
    pub total: Money,
    /// Interest-only instalment paid during deferment, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferment_payment: Option<Money>,
}

fn payment_breakdown(params: &LoanParameters) -> CrdEngineResult<MonthlyPaymentOutput> {
    params.validate()?;

    let principal_and_interest = round_currency(steady_payment(
        params.principal,
        params.monthly_rate(),
        params.duration_months,
    )?);
    let insurance = round_currency(checked_product(
        params.principal,
        params.monthly_insurance_rate(),
        "monthly insurance",
    )?);
    let deferment_payment = if params.deferment_months > 0 {
        let interest_only = checked_product(params.principal, params.monthly_rate(), "deferment interest")?;
        Some(round_currency(interest_only) + insurance)
    } else {
        None
    };

    Ok(MonthlyPaymentOutput {
        principal_and_interest,
        insurance,
        total: principal_and_interest + insurance,
        deferment_payment,
    })
}

/// Monthly payment breakdown in the standard envelope.
pub fn monthly_payment(params: &LoanParameters) -> CrdEngineResult<ComputationOutput<MonthlyPaymentOutput>> {
    let start = Instant::now();
    let output = payment_breakdown(params)?;

    let methodology = if params.annual_rate_pct.is_zero() {
        "Straight-line repayment (zero rate) plus flat insurance"
    } else {
        "Fixed annuity over the full duration plus flat insurance"
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        &serde_json::json!({
            "principal": params.principal.to_string(),
            "annualRatePct": params.annual_rate_pct.to_string(),
            "durationMonths": params.duration_months,
            "insurancePct": params.insurance_pct.to_string(),
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}
