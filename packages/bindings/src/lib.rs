use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

use proforma_core::projection::amortization::{build_amortization_schedule, AmortizationInput};
use proforma_core::projection::inputs::{parse_manual_counts as parse_counts, ProFormaInput};
use proforma_core::projection::model::project_pro_forma as project;
use proforma_core::scenarios::sensitivity::{run_sensitivity, SensitivityInput};
use proforma_core::time_value::{calculate_irr, IrrInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Run the monthly projection. `manual_counts_json` is an optional JSON array
/// of subscriber counts that overrides any counts on the input.
#[napi]
pub fn project_pro_forma(
    input_json: String,
    manual_counts_json: Option<String>,
) -> NapiResult<String> {
    let input: ProFormaInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let counts: Option<Vec<Decimal>> = manual_counts_json
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(to_napi_error)?;
    let output = project(&input, counts.as_deref()).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn baseline_inputs() -> NapiResult<String> {
    serde_json::to_string(&ProFormaInput::baseline()).map_err(to_napi_error)
}

/// Tokenize free-text subscriber counts; returns `{counts, rejected}`.
#[napi]
pub fn parse_manual_counts(text: String) -> NapiResult<String> {
    serde_json::to_string(&parse_counts(&text)).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Debt and returns
// ---------------------------------------------------------------------------

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: AmortizationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = build_amortization_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn irr(input_json: String) -> NapiResult<String> {
    let input: IrrInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = calculate_irr(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn sensitivity(input_json: String) -> NapiResult<String> {
    let input: SensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = run_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
