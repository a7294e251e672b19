use serde_json::Value;

use super::{format_scalar, result_of};

/// Headline figures, most specific first.
const PRIORITY_KEYS: [&str; 5] = [
    "crd",
    "total",
    "steadyPayment",
    "totalCrd",
    "totalInterest",
];

/// Print just the key answer value from the output.
///
/// Looks for a headline field in the result, then in its nested objects
/// (a schedule or report summary), then falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = result_of(value);

    if let Value::Object(map) = result_obj {
        let nested = map.values().filter_map(Value::as_object);
        for scope in std::iter::once(map).chain(nested) {
            for key in PRIORITY_KEYS {
                if let Some(val) = scope.get(key).filter(|v| !v.is_null()) {
                    println!("{}", format_scalar(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_scalar(val));
            return;
        }
    }

    println!("{}", format_scalar(result_obj));
}
