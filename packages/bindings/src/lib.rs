use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crd_engine_core::portfolio::{calculate_portfolio_report, PortfolioInput};
use crd_engine_core::schedule::annual::calculate_annual_breakdown;
use crd_engine_core::schedule::builder::{amortize, LoanParameters, ScheduleRequest};
use crd_engine_core::schedule::payment::monthly_payment as compute_monthly_payment;
use crd_engine_core::schedule::query::{query_crd, CrdQueryInput};
use crd_engine_core::CrdEngineResult;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Decode `input_json`, run `f` and encode its output.
fn call_json<I, O>(input_json: &str, f: impl FnOnce(&I) -> CrdEngineResult<O>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = f(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Single loan
// ---------------------------------------------------------------------------

#[napi]
pub fn build_schedule(input_json: String) -> NapiResult<String> {
    call_json::<ScheduleRequest, _>(&input_json, amortize)
}

#[napi]
pub fn monthly_payment(input_json: String) -> NapiResult<String> {
    call_json::<LoanParameters, _>(&input_json, compute_monthly_payment)
}

#[napi]
pub fn crd_at(input_json: String) -> NapiResult<String> {
    call_json::<CrdQueryInput, _>(&input_json, query_crd)
}

#[napi]
pub fn annual_breakdown(input_json: String) -> NapiResult<String> {
    call_json::<LoanParameters, _>(&input_json, calculate_annual_breakdown)
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[napi]
pub fn portfolio_report(input_json: String) -> NapiResult<String> {
    call_json::<PortfolioInput, _>(&input_json, calculate_portfolio_report)
}
