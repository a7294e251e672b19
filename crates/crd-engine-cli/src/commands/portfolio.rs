use clap::Args;
use serde_json::Value;

use crd_engine_core::portfolio::{
    build_portfolio_report, calculate_portfolio_report, JsonFileLoanRepository, PortfolioInput,
    PortfolioReportRequest,
};
use crd_engine_core::YearMonth;

use crate::input;

/// Arguments for a portfolio report
#[derive(Args)]
pub struct PortfolioArgs {
    /// JSON file holding an array of loan records (or {"loans": [...]})
    #[arg(long, conflicts_with = "input")]
    pub loans: Option<String>,

    /// JSON file holding loans and report options together
    #[arg(long)]
    pub input: Option<String>,

    /// Only include loans attached to this property
    #[arg(long)]
    pub property: Option<String>,

    /// Exclude loans whose end date has passed
    #[arg(long)]
    pub active_only: bool,

    /// First month of the timeline (default: January of the current year)
    #[arg(long)]
    pub from: Option<YearMonth>,

    /// Last month of the timeline (default: current month)
    #[arg(long)]
    pub to: Option<YearMonth>,

    /// Reference current month (default: today's date)
    #[arg(long)]
    pub today: Option<YearMonth>,
}

impl PortfolioArgs {
    fn request(&self) -> PortfolioReportRequest {
        PortfolioReportRequest {
            property_id: self.property.clone(),
            active_only: self.active_only,
            from: self.from,
            to: self.to,
            today: self
                .today
                .unwrap_or_else(|| YearMonth::from_date(chrono::Local::now().date_naive())),
        }
    }
}

pub fn run_portfolio(args: PortfolioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.loans {
        let resolved = input::resolve_path(path)?;
        let repository = JsonFileLoanRepository::new(resolved);
        let result = build_portfolio_report(&repository, &args.request())?;
        return Ok(serde_json::to_value(result)?);
    }

    let portfolio_input: PortfolioInput = input::load(args.input.as_deref())?
        .ok_or("--loans <file.json>, --input <file.json> or stdin required for a portfolio report")?;
    let result = calculate_portfolio_report(&portfolio_input)?;
    Ok(serde_json::to_value(result)?)
}
