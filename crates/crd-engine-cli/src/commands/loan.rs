use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use crd_engine_core::schedule::annual;
use crd_engine_core::schedule::builder::{self, LoanParameters, ScheduleRequest};
use crd_engine_core::schedule::payment;
use crd_engine_core::schedule::query::{self, CrdQueryInput};
use crd_engine_core::YearMonth;

use crate::input;

/// Loan definition shared by every single-loan command
#[derive(Args)]
pub struct LoanArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount borrowed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (e.g. 3.2)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Loan duration in months, deferment included
    #[arg(long)]
    pub duration: Option<u32>,

    /// Interest-only months at the start of the loan
    #[arg(long, default_value_t = 0)]
    pub deferment: u32,

    /// Annual insurance rate in percent of the original principal
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub insurance: Decimal,

    /// First instalment month (YYYY-MM or YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<YearMonth>,
}

impl LoanArgs {
    fn to_parameters(&self) -> Result<LoanParameters, Box<dyn std::error::Error>> {
        let principal = self
            .principal
            .ok_or("--principal is required (or provide --input)")?;
        let annual_rate_pct = self.rate.ok_or("--rate is required (or provide --input)")?;
        let duration_months = self
            .duration
            .ok_or("--duration is required (or provide --input)")?;
        let start_date = self.start.ok_or("--start is required (or provide --input)")?;

        Ok(LoanParameters {
            principal,
            annual_rate_pct,
            duration_months,
            deferment_months: self.deferment,
            insurance_pct: self.insurance,
            start_date,
        })
    }
}

/// Arguments for a full repayment schedule
#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// First month to list (rows before are omitted)
    #[arg(long)]
    pub from: Option<YearMonth>,

    /// Last month to list (rows after are omitted)
    #[arg(long)]
    pub to: Option<YearMonth>,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ScheduleRequest = match input::load(args.loan.input.as_deref())? {
        Some(request) => request,
        None => ScheduleRequest {
            loan: args.loan.to_parameters()?,
            from: args.from,
            to: args.to,
        },
    };

    let result = builder::amortize(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the monthly payment calculation
#[derive(Args)]
pub struct PaymentArgs {
    #[command(flatten)]
    pub loan: LoanArgs,
}

pub fn run_payment(args: PaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: LoanParameters = match input::load(args.loan.input.as_deref())? {
        Some(params) => params,
        None => args.loan.to_parameters()?,
    };

    let result = payment::monthly_payment(&params)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a capital-remaining-due query
#[derive(Args)]
pub struct CrdAtArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// 1-based instalment number
    #[arg(long, conflicts_with = "at", allow_hyphen_values = true)]
    pub month: Option<i64>,

    /// Calendar month (YYYY-MM)
    #[arg(long)]
    pub at: Option<YearMonth>,
}

pub fn run_crd_at(args: CrdAtArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let query_input: CrdQueryInput = match input::load(args.loan.input.as_deref())? {
        Some(query_input) => query_input,
        None => {
            if args.month.is_none() && args.at.is_none() {
                return Err("--month or --at is required".into());
            }
            CrdQueryInput {
                loan: args.loan.to_parameters()?,
                month_index: args.month,
                at: args.at,
            }
        }
    };

    let result = query::query_crd(&query_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the calendar-year breakdown
#[derive(Args)]
pub struct AnnualArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Only report this calendar year
    #[arg(long)]
    pub year: Option<i32>,
}

pub fn run_annual(args: AnnualArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: LoanParameters = match input::load(args.loan.input.as_deref())? {
        Some(params) => params,
        None => args.loan.to_parameters()?,
    };

    let mut result = annual::calculate_annual_breakdown(&params)?;
    if let Some(year) = args.year {
        result.result.years.retain(|y| y.year == year);
        if result.result.years.is_empty() {
            return Err(format!("The loan has no instalments in {year}").into());
        }
        result.result.total_interest = result.result.years.iter().map(|y| y.interest).sum();
        result.result.total_insurance = result.result.years.iter().map(|y| y.insurance).sum();
    }
    Ok(serde_json::to_value(result)?)
}
