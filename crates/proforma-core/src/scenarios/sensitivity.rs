use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use crate::error::ProFormaError;
use crate::projection::inputs::ProFormaInput;
use crate::projection::model::{project_pro_forma, ProjectionResult};
use crate::types::*;
use crate::ProFormaResult;

/// Largest grid a single sweep may evaluate.
const MAX_GRID_CELLS: usize = 10_000;

/// Projection figure reported in each grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProFormaMetric {
    IrrAnnual,
    ExitValue,
    EndingCash,
    TotalDistributions,
    EbitdaValuation,
}

impl ProFormaMetric {
    /// Read the metric off a projection. Only IRR can be undefined.
    pub fn extract(&self, result: &ProjectionResult) -> Option<Decimal> {
        match self {
            ProFormaMetric::IrrAnnual => result.irr_annual,
            ProFormaMetric::ExitValue => Some(result.exit_value),
            ProFormaMetric::EndingCash => Some(result.returns.ending_cash),
            ProFormaMetric::TotalDistributions => Some(result.returns.total_distributions),
            ProFormaMetric::EbitdaValuation => Some(result.ebitda_multiple_valuation),
        }
    }
}

impl FromStr for ProFormaMetric {
    type Err = ProFormaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "irr_annual" | "irr" => Ok(ProFormaMetric::IrrAnnual),
            "exit_value" => Ok(ProFormaMetric::ExitValue),
            "ending_cash" => Ok(ProFormaMetric::EndingCash),
            "total_distributions" => Ok(ProFormaMetric::TotalDistributions),
            "ebitda_valuation" => Ok(ProFormaMetric::EbitdaValuation),
            other => Err(ProFormaError::InvalidInput {
                field: "output_metric".into(),
                reason: format!("Unknown metric '{other}'"),
            }),
        }
    }
}

/// Input for a one- or two-way sensitivity sweep over the projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub base_inputs: ProFormaInput,
    /// Swept along the rows
    pub variable_1: SensitivityVariable,
    /// Swept along the columns; a one-way sweep has a single column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_2: Option<SensitivityVariable>,
    pub output_metric: ProFormaMetric,
    /// Manual subscriber counts applied to every cell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_counts: Option<Vec<Decimal>>,
}

/// Output of a sensitivity sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1_name: String,
    pub variable_1_values: Vec<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_2_name: Option<String>,
    pub variable_2_values: Vec<Decimal>,
    pub output_metric: ProFormaMetric,
    /// Matrix[i][j] = metric with variable_1 = values_1[i] and variable_2 = values_2[j];
    /// `None` where the metric is undefined or the cell failed to evaluate
    pub matrix: Vec<Vec<Option<Decimal>>>,
    /// Metric at the unmodified base inputs
    pub base_case_value: Option<Decimal>,
    /// Grid cell closest to the base inputs (row, col)
    pub base_case_position: (usize, usize),
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> ProFormaResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(ProFormaError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(ProFormaError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Min must be <= max".into(),
        });
    }
    let span = ((var.max - var.min) / var.step).floor().to_usize().unwrap_or(usize::MAX);
    if span >= MAX_GRID_CELLS {
        return Err(ProFormaError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: format!("Sweep exceeds {MAX_GRID_CELLS} values"),
        });
    }

    let mut values: Vec<Decimal> = (0..=span)
        .map(|i| var.min + var.step * Decimal::from(i as u64))
        .collect();
    // Include max when the step does not land on it
    if values.last().is_some_and(|last| *last < var.max) {
        values.push(var.max);
    }
    Ok(values)
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn locate<'a>(root: &'a mut Value, path: &str) -> ProFormaResult<&'a mut Value> {
    let mut node = root;
    for key in path.split('.') {
        node = node
            .as_object_mut()
            .and_then(|obj| obj.get_mut(key))
            .ok_or_else(|| ProFormaError::InvalidInput {
                field: path.to_string(),
                reason: format!("No input field '{key}'"),
            })?;
    }
    Ok(node)
}

/// Numeric value of the field at a dotted path, if it holds one.
pub fn read_input_field(input: &ProFormaInput, path: &str) -> ProFormaResult<Option<Decimal>> {
    let mut tree = serde_json::to_value(input)?;
    let node = locate(&mut tree, path)?;
    Ok(match node {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    })
}

/// Copy of `input` with the numeric field at a dotted path (e.g. `loan.apr`)
/// replaced by `value`.
///
/// Month counts accept integral values only.
pub fn with_input_field(
    input: &ProFormaInput,
    path: &str,
    value: Decimal,
) -> ProFormaResult<ProFormaInput> {
    let mut tree = serde_json::to_value(input)?;
    let node = locate(&mut tree, path)?;
    let replacement = match &*node {
        Value::String(_) | Value::Null => Value::String(value.to_string()),
        Value::Number(_) => {
            let whole = value
                .fract()
                .is_zero()
                .then(|| value.to_u64())
                .flatten()
                .ok_or_else(|| ProFormaError::InvalidInput {
                    field: path.to_string(),
                    reason: format!("{value} is not a whole, non-negative count"),
                })?;
            Value::from(whole)
        }
        _ => {
            return Err(ProFormaError::InvalidInput {
                field: path.to_string(),
                reason: "Field is not numeric".into(),
            })
        }
    };
    *node = replacement;
    Ok(serde_json::from_value(tree)?)
}

fn evaluate_cell(
    input: &SensitivityInput,
    assignments: &[(&str, Decimal)],
) -> ProFormaResult<Option<Decimal>> {
    let mut scenario = input.base_inputs.clone();
    for (path, value) in assignments {
        scenario = with_input_field(&scenario, path, *value)?;
    }
    let projection = project_pro_forma(&scenario, input.manual_counts.as_deref())?;
    Ok(input.output_metric.extract(&projection.result))
}

/// Sweep one or two input fields and report the chosen metric per cell.
pub fn run_sensitivity(
    input: &SensitivityInput,
) -> ProFormaResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = match &input.variable_2 {
        Some(var) => generate_sweep_values(var)?,
        None => Vec::new(),
    };
    if v1_values.len() * v2_values.len().max(1) > MAX_GRID_CELLS {
        return Err(ProFormaError::InvalidInput {
            field: "variable_2".into(),
            reason: format!("Grid exceeds {MAX_GRID_CELLS} cells"),
        });
    }

    // Validate the paths up front so a typo fails the whole sweep
    let base_1 = read_input_field(&input.base_inputs, &input.variable_1.name)?;
    let base_2 = match &input.variable_2 {
        Some(var) => read_input_field(&input.base_inputs, &var.name)?,
        None => None,
    };

    let name_1 = input.variable_1.name.as_str();
    let mut matrix = Vec::with_capacity(v1_values.len());
    for v1 in &v1_values {
        let row = match &input.variable_2 {
            None => vec![evaluate_logged(input, &[(name_1, *v1)], &mut warnings)],
            Some(var) => v2_values
                .iter()
                .map(|v2| evaluate_logged(input, &[(name_1, *v1), (var.name.as_str(), *v2)], &mut warnings))
                .collect(),
        };
        matrix.push(row);
    }

    let base_case = project_pro_forma(&input.base_inputs, input.manual_counts.as_deref())?;
    let base_case_value = input.output_metric.extract(&base_case.result);

    let base_row = closest_index(&v1_values, base_1.unwrap_or(input.variable_1.min));
    let base_col = match (&input.variable_2, base_2) {
        (Some(_), Some(value)) => closest_index(&v2_values, value),
        _ => 0,
    };
    debug!(
        rows = matrix.len(),
        cols = v2_values.len().max(1),
        "sensitivity grid evaluated"
    );

    let output = SensitivityOutput {
        variable_1_name: input.variable_1.name.clone(),
        variable_1_values: v1_values,
        variable_2_name: input.variable_2.as_ref().map(|v| v.name.clone()),
        variable_2_values: v2_values,
        output_metric: input.output_metric,
        matrix,
        base_case_value,
        base_case_position: (base_row, base_col),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        if input.variable_2.is_some() {
            "2-Way Pro-Forma Sensitivity"
        } else {
            "1-Way Pro-Forma Sensitivity"
        },
        &serde_json::json!({
            "variable_1": input.variable_1.name,
            "variable_2": input.variable_2.as_ref().map(|v| v.name.clone()),
            "output_metric": input.output_metric,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn evaluate_logged(
    input: &SensitivityInput,
    assignments: &[(&str, Decimal)],
    warnings: &mut Vec<String>,
) -> Option<Decimal> {
    match evaluate_cell(input, assignments) {
        Ok(value) => value,
        Err(e) => {
            let at: Vec<String> = assignments
                .iter()
                .map(|(path, value)| format!("{path}={value}"))
                .collect();
            warnings.push(format!("Evaluation failed at ({}): {e}", at.join(", ")));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn variable(name: &str, min: Decimal, max: Decimal, step: Decimal) -> SensitivityVariable {
        SensitivityVariable {
            name: name.into(),
            min,
            max,
            step,
        }
    }

    fn sample_input() -> SensitivityInput {
        SensitivityInput {
            base_inputs: ProFormaInput::baseline(),
            variable_1: variable("deal.exit_multiple", dec!(2), dec!(4), dec!(1)),
            variable_2: None,
            output_metric: ProFormaMetric::ExitValue,
            manual_counts: None,
        }
    }

    #[test]
    fn test_sweep_values() {
        let vals = generate_sweep_values(&variable("test", dec!(1), dec!(5), dec!(1))).unwrap();
        assert_eq!(vals, vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);
    }

    #[test]
    fn test_sweep_with_non_exact_step() {
        let vals = generate_sweep_values(&variable("test", dec!(0), dec!(1), dec!(0.3))).unwrap();
        // 0, 0.3, 0.6, 0.9, 1.0 (max appended)
        assert_eq!(vals.len(), 5);
        assert_eq!(*vals.last().unwrap(), dec!(1));
    }

    #[test]
    fn test_invalid_step() {
        assert!(generate_sweep_values(&variable("bad", dec!(0), dec!(1), dec!(0))).is_err());
        assert!(generate_sweep_values(&variable("bad", dec!(2), dec!(1), dec!(1))).is_err());
    }

    #[test]
    fn test_set_decimal_and_count_fields() {
        let base = ProFormaInput::baseline();
        let updated = with_input_field(&base, "loan.apr", dec!(0.1)).unwrap();
        assert_eq!(updated.loan.apr, dec!(0.1));
        let updated = with_input_field(&base, "occupancy.rent_free_months", dec!(5)).unwrap();
        assert_eq!(updated.occupancy.rent_free_months, 5);
        assert!(with_input_field(&base, "occupancy.rent_free_months", dec!(2.5)).is_err());
        assert!(with_input_field(&base, "loan.no_such_field", dec!(1)).is_err());
        assert!(with_input_field(&base, "loan", dec!(1)).is_err());
    }

    #[test]
    fn test_set_absent_optional_field() {
        let base = ProFormaInput::baseline();
        let updated = with_input_field(&base, "revenue.monthly_capacity_cap", dec!(50_000));
        // absent optionals are skipped on serialization, so the path is unknown
        assert!(updated.is_err());
        assert_eq!(
            read_input_field(&base, "deal.exit_multiple").unwrap(),
            Some(dec!(3))
        );
    }

    #[test]
    fn test_one_way_exit_value_scales_with_multiple() {
        let out = run_sensitivity(&sample_input()).unwrap().result;
        assert_eq!(out.variable_1_values, vec![dec!(2), dec!(3), dec!(4)]);
        assert!(out.variable_2_values.is_empty());
        assert_eq!(out.matrix.len(), 3);
        assert!(out.matrix.iter().all(|row| row.len() == 1));

        let at_2 = out.matrix[0][0].unwrap();
        let at_4 = out.matrix[2][0].unwrap();
        assert!((at_4 - at_2 * dec!(2)).abs() < dec!(0.0001), "{at_2} vs {at_4}");
        // baseline exit multiple is 3
        assert_eq!(out.base_case_position, (1, 0));
        assert_eq!(out.base_case_value, out.matrix[1][0]);
    }

    #[test]
    fn test_two_way_grid_and_failed_cells() {
        let mut input = sample_input();
        input.variable_2 = Some(variable(
            "deal.project_magnitude",
            dec!(-100_000),
            dec!(600_000),
            dec!(350_000),
        ));
        let result = run_sensitivity(&input).unwrap();
        let out = &result.result;
        assert_eq!(out.variable_2_values.len(), 3);
        assert_eq!(out.matrix[0].len(), 3);
        // a negative magnitude is rejected, so its column is empty
        assert!(out.matrix.iter().all(|row| row[0].is_none()));
        assert!(out.matrix.iter().all(|row| row[2].is_some()));
        assert_eq!(result.warnings.len(), 3);
        assert_eq!(out.base_case_position, (1, 2));
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            "irr_annual".parse::<ProFormaMetric>().unwrap(),
            ProFormaMetric::IrrAnnual
        );
        assert!("npv".parse::<ProFormaMetric>().is_err());
    }
}
