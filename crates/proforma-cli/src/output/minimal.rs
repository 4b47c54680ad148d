use serde_json::Value;

/// Result fields worth printing on their own, highest priority first.
const PRIORITY_KEYS: [&str; 6] = [
    "irr_annual",
    "annualized_irr",
    "exit_value",
    "amortizing_payment",
    "base_case_value",
    "periodic_irr",
];

/// Print just the key answer value from the output.
///
/// Looks for well-known result fields in priority order, then falls back to
/// the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        // a null IRR is an answer, print it
        if let Some((key, val)) = PRIORITY_KEYS
            .iter()
            .find_map(|key| map.get(*key).map(|val| (*key, val)))
        {
            println!("{key}: {}", format_minimal(val));
            return;
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{key}: {}", format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "none".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
