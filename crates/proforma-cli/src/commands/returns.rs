use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use proforma_core::time_value::{calculate_irr, IrrInput};

use crate::input;

/// Arguments for a periodic IRR
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Periodic cash flows, the first at t = 0 (comma-separated, e.g. "-100,30,30,60")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Periods per year used to annualize
    #[arg(long)]
    pub periods_per_year: Option<u32>,

    /// Periodic rate at which to also report NPV
    #[arg(long, allow_hyphen_values = true)]
    pub discount_rate: Option<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr_input: IrrInput = match input::load(args.input.as_deref())? {
        Some(irr_input) => irr_input,
        None => IrrInput {
            cash_flows: args
                .cash_flows
                .ok_or("--cash-flows is required (or provide --input)")?,
            periods_per_year: args.periods_per_year,
            discount_rate: args.discount_rate,
        },
    };

    let result = calculate_irr(&irr_input)?;
    Ok(serde_json::to_value(result)?)
}
