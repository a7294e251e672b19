mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::loan::{AnnualArgs, CrdAtArgs, PaymentArgs, ScheduleArgs};
use commands::portfolio::PortfolioArgs;

/// Loan amortization schedules and portfolio CRD reports
#[derive(Parser)]
#[command(
    name = "crd",
    version,
    about = "Loan amortization schedules and portfolio CRD reports",
    long_about = "Builds month-by-month repayment schedules for mortgage-style loans \
                  (annuity, interest-only deferment, flat insurance) with decimal \
                  precision, answers capital-remaining-due queries and aggregates \
                  loan portfolios by month and property."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log debug events to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a full repayment schedule
    Schedule(ScheduleArgs),
    /// Steady monthly payment (principal + interest + insurance)
    Payment(PaymentArgs),
    /// Capital remaining due at an instalment or calendar month
    CrdAt(CrdAtArgs),
    /// Per-calendar-year repayment totals
    Annual(AnnualArgs),
    /// Portfolio report: CRD timeline, CRD by property, costliest loans
    Portfolio(PortfolioArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "crd_engine_core=debug,crd=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the results; keep logs on stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::loan::run_schedule(args),
        Commands::Payment(args) => commands::loan::run_payment(args),
        Commands::CrdAt(args) => commands::loan::run_crd_at(args),
        Commands::Annual(args) => commands::loan::run_annual(args),
        Commands::Portfolio(args) => commands::portfolio::run_portfolio(args),
        Commands::Version => {
            println!("crd {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
