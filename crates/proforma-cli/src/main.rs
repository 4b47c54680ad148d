mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::debt::AmortizeArgs;
use commands::projection::{BaselineArgs, ExportArgs, ProjectArgs};
use commands::returns::IrrArgs;
use commands::scenarios::SensitivityArgs;

/// Monthly restaurant pro-forma projections
#[derive(Parser)]
#[command(
    name = "proforma",
    version,
    about = "Monthly restaurant pro-forma projections",
    long_about = "A CLI for projecting a restaurant investment month by month with decimal \
                  precision: revenue composition, cost stack, debt service, working capital, \
                  DSCR-gated distributions, equity split, exit value and investor IRR."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log projection stages to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full monthly projection
    Project(ProjectArgs),
    /// Write the monthly series as a delimited export
    Export(ExportArgs),
    /// Build a loan amortization schedule
    Amortize(AmortizeArgs),
    /// IRR of a periodic cash-flow series (bisection)
    Irr(IrrArgs),
    /// Sweep one or two input fields and report a projection metric
    Sensitivity(SensitivityArgs),
    /// Print the built-in baseline scenario as an input template
    Baseline(BaselineArgs),
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
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Project(args) => commands::projection::run_project(args),
        Commands::Export(args) => commands::projection::run_export(args).map(|()| serde_json::Value::Null),
        Commands::Amortize(args) => commands::debt::run_amortize(args),
        Commands::Irr(args) => commands::returns::run_irr(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args),
        Commands::Baseline(args) => commands::projection::run_baseline(args),
        Commands::Version => {
            println!("proforma {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(serde_json::Value::Null) => process::exit(0),
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
