pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Keys whose value is the row set of a result (projection table,
/// schedule, ranked strategies, ...), in lookup order.
pub const ROW_KEYS: [&str; 5] = ["projection", "periods", "strategies", "results", "bars"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("JSON serialization error: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// The `result` object of a computation envelope, or the value itself.
pub fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// First non-empty array of objects under one of [`ROW_KEYS`].
pub fn row_set(result: &Map<String, Value>) -> Option<(&'static str, &Vec<Value>)> {
    ROW_KEYS.iter().find_map(|key| match result.get(*key) {
        Some(Value::Array(rows)) if rows.first().is_some_and(Value::is_object) => {
            Some((*key, rows))
        }
        _ => None,
    })
}

/// Render a scalar cell; nested structures fall back to compact JSON.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) if arr.iter().all(|v| !v.is_object() && !v.is_array()) => arr
            .iter()
            .map(format_cell)
            .collect::<Vec<_>>()
            .join(", "),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_set_prefers_projection() {
        let result = json!({
            "irr": "0.12",
            "projection": [{ "period": 1 }],
            "cash_flow_vector": ["-100", "110"]
        });
        let (key, rows) = row_set(result.as_object().unwrap()).unwrap();
        assert_eq!(key, "projection");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_row_set_skips_scalar_arrays() {
        let result = json!({ "excluded_by_timeline": ["hold"], "strategies": [] });
        assert!(row_set(result.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&json!("1765.79")), "1765.79");
        assert_eq!(format_cell(&json!(null)), "");
        assert_eq!(format_cell(&json!(["hold", "flip"])), "hold, flip");
        assert_eq!(format_cell(&json!({ "a": 1 })), "{\"a\":1}");
    }
}
