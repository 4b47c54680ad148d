use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use colored::Colorize;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fs::File;
use std::io;

use proforma_core::projection::inputs::{parse_manual_counts, ProFormaInput};
use proforma_core::projection::model::project_pro_forma;

use crate::input;
use crate::output::monthly_csv;

/// Input options shared by `project` and `export`
#[derive(Args)]
pub struct ScenarioArgs {
    /// Path to a JSON or YAML input file (default: stdin, then the baseline)
    #[arg(long)]
    pub input: Option<String>,

    /// Manual subscriber counts as free text, e.g. "120, 135 150"
    #[arg(long, allow_hyphen_values = true, conflicts_with = "counts_file")]
    pub counts: Option<String>,

    /// File with manual subscriber counts separated by commas or whitespace
    #[arg(long)]
    pub counts_file: Option<String>,

    /// First day of month one, labels each month (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Projection length in years (overrides the input)
    #[arg(long)]
    pub term_years: Option<Decimal>,
}

/// Arguments for the full projection
#[derive(Args)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Leave the monthly series out of the output
    #[arg(long)]
    pub summary: bool,
}

/// Arguments for the monthly delimited export
#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Output file (default: stdout)
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TemplateFormat {
    Json,
    Yaml,
}

/// Arguments for printing the baseline scenario
#[derive(Args)]
pub struct BaselineArgs {
    /// Template format
    #[arg(long, value_enum, default_value = "json")]
    pub format: TemplateFormat,
}

fn load_scenario(
    args: &ScenarioArgs,
) -> Result<(ProFormaInput, Option<Vec<Decimal>>), Box<dyn std::error::Error>> {
    let mut scenario: ProFormaInput = input::load(args.input.as_deref())?
        .unwrap_or_else(ProFormaInput::baseline);
    if let Some(date) = args.start_date {
        scenario.start_date = Some(date);
    }
    if let Some(years) = args.term_years {
        scenario.term_years = years;
    }

    let text = match (&args.counts, &args.counts_file) {
        (Some(inline), _) => Some(inline.clone()),
        (None, Some(path)) => Some(input::file::read_text(path)?),
        (None, None) => None,
    };
    let counts = text.map(|text| {
        let parsed = parse_manual_counts(&text);
        if !parsed.rejected.is_empty() {
            eprintln!(
                "{}: skipped non-numeric subscriber counts: {}",
                "warning".yellow().bold(),
                parsed.rejected.join(", ")
            );
        }
        parsed.counts
    });

    Ok((scenario, counts))
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (scenario, counts) = load_scenario(&args.scenario)?;
    let result = project_pro_forma(&scenario, counts.as_deref())?;
    let mut value = serde_json::to_value(result)?;
    if args.summary {
        if let Some(Value::Object(result)) = value.get_mut("result") {
            result.remove("months");
        }
    }
    Ok(value)
}

pub fn run_export(args: ExportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (scenario, counts) = load_scenario(&args.scenario)?;
    let result = project_pro_forma(&scenario, counts.as_deref())?;
    for w in &result.warnings {
        eprintln!("{}: {}", "warning".yellow().bold(), w);
    }

    match args.out {
        Some(path) => {
            let file = File::create(&path).map_err(|e| format!("Failed to create '{path}': {e}"))?;
            monthly_csv::write_monthly_csv(file, &result.result.months)?;
        }
        None => monthly_csv::write_monthly_csv(io::stdout().lock(), &result.result.months)?,
    }
    Ok(())
}

pub fn run_baseline(args: BaselineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let baseline = ProFormaInput::baseline();
    match args.format {
        TemplateFormat::Json => Ok(serde_json::to_value(baseline)?),
        TemplateFormat::Yaml => {
            print!("{}", serde_yaml::to_string(&baseline)?);
            Ok(Value::Null)
        }
    }
}
