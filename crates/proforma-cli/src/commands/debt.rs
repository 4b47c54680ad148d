use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use proforma_core::projection::amortization::{build_amortization_schedule, AmortizationInput};

use crate::input;

/// Arguments for a loan amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual percentage rate as a decimal (0.085 = 8.5%)
    #[arg(long)]
    pub apr: Option<Decimal>,

    /// Loan term in months
    #[arg(long)]
    pub term_months: Option<u32>,

    /// Interest-only months at the start of the term
    #[arg(long, default_value_t = 0)]
    pub interest_only_months: u32,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan: AmortizationInput = match input::load(args.input.as_deref())? {
        Some(loan) => loan,
        None => AmortizationInput {
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            apr: args.apr.ok_or("--apr is required (or provide --input)")?,
            term_months: args
                .term_months
                .ok_or("--term-months is required (or provide --input)")?,
            interest_only_months: args.interest_only_months,
        },
    };

    let result = build_amortization_schedule(&loan)?;
    Ok(serde_json::to_value(result)?)
}
