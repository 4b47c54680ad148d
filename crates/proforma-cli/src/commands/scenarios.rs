use clap::Args;
use serde_json::Value;

use proforma_core::projection::inputs::{parse_manual_counts, ProFormaInput};
use proforma_core::scenarios::sensitivity::{run_sensitivity as sweep, ProFormaMetric, SensitivityInput};
use proforma_core::SensitivityVariable;

use crate::input;

/// Arguments for sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// First sensitivity variable in format path:min:max:step
    /// (e.g. "loan.apr:0.06:0.10:0.01")
    #[arg(long, allow_hyphen_values = true)]
    pub var1: String,

    /// Second sensitivity variable (optional, creates a 2D grid)
    #[arg(long, allow_hyphen_values = true)]
    pub var2: Option<String>,

    /// Metric per cell: irr_annual, exit_value, ending_cash, total_distributions, ebitda_valuation
    #[arg(long, default_value = "irr_annual")]
    pub metric: String,

    /// Path to JSON or YAML base scenario (default: stdin, then the baseline)
    #[arg(long)]
    pub base_inputs: Option<String>,

    /// Manual subscriber counts as free text
    #[arg(long)]
    pub counts: Option<String>,
}

fn parse_sens_var(spec: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be path:min:max:step, got '{}'",
            spec
        )
        .into());
    }
    Ok(SensitivityVariable {
        name: parts[0].to_string(),
        min: parts[1].parse()?,
        max: parts[2].parse()?,
        step: parts[3].parse()?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let base_inputs: ProFormaInput = input::load(args.base_inputs.as_deref())?
        .unwrap_or_else(ProFormaInput::baseline);

    let request = SensitivityInput {
        base_inputs,
        variable_1: parse_sens_var(&args.var1)?,
        variable_2: args.var2.as_deref().map(parse_sens_var).transpose()?,
        output_metric: args.metric.parse::<ProFormaMetric>()?,
        manual_counts: args.counts.as_deref().map(|text| parse_manual_counts(text).counts),
    };

    let result = sweep(&request)?;
    Ok(serde_json::to_value(result)?)
}
