use serde_json::Value;

use super::{format_cell, result_of};

/// Headline fields, most specific first.
const PRIORITY_KEYS: [&str; 10] = [
    "break_even_value",
    "recommended",
    "mao",
    "irr",
    "monthly_payment",
    "worst_case",
    "base_case_value",
    "baseline",
    "total_profit",
    "net_cash_flow",
];

/// Print just the headline value of a result.
///
/// Falls back to the first field when none of the known headline fields is
/// present.
pub fn print_minimal(value: &Value) {
    let result = result_of(value);

    if let Value::Object(map) = result {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                println!("{}", format_cell(val));
                return;
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_cell(val));
            return;
        }
    }

    println!("{}", format_cell(result));
}
