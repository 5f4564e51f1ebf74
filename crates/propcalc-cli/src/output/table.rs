use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_cell, result_of, row_set};

/// Render a result as a field/value summary followed by its row set
/// (projection periods, schedule rows, ranked strategies).
pub fn print_table(value: &Value) {
    let envelope = value.as_object();
    match result_of(value) {
        Value::Object(result) => {
            print_summary(result);
            if let Some((key, rows)) = row_set(result) {
                println!("\n{}:", key);
                print_rows(rows);
            }
            if let Some(Value::Array(matrix)) = result.get("matrix") {
                println!("\nmatrix:");
                print_matrix(result, matrix);
            }
        }
        Value::Array(rows) => print_rows(rows),
        other => println!("{}", other),
    }

    let Some(envelope) = envelope else {
        return;
    };
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Scalar fields only; row sets and the matrix get their own tables.
fn print_summary(result: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in result {
        let tabular = matches!(val, Value::Array(a) if a.first().is_some_and(|v| v.is_object() || v.is_array()));
        if !tabular {
            builder.push_record([key.as_str(), &format_cell(val)]);
        }
    }
    println!("{}", Table::from(builder));
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", format_cell(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for map in rows.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(h.as_str()).map(format_cell).unwrap_or_default())
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

/// Two-way grid: rows are variable_1 values, columns variable_2 values.
fn print_matrix(result: &Map<String, Value>, matrix: &[Value]) {
    let labels = |key: &str| -> Vec<String> {
        match result.get(key) {
            Some(Value::Array(vals)) => vals.iter().map(format_cell).collect(),
            _ => Vec::new(),
        }
    };
    let row_labels = labels("variable_1_values");
    let col_labels = labels("variable_2_values");

    let mut builder = Builder::default();
    let corner = format!(
        "{} \\ {}",
        result.get("variable_1").map(format_cell).unwrap_or_default(),
        result.get("variable_2").map(format_cell).unwrap_or_default()
    );
    builder.push_record(std::iter::once(corner).chain(col_labels));
    for (i, row) in matrix.iter().enumerate() {
        let cells = row.as_array().map(|r| r.iter().map(format_cell).collect::<Vec<_>>());
        let label = row_labels.get(i).cloned().unwrap_or_default();
        builder.push_record(std::iter::once(label).chain(cells.unwrap_or_default()));
    }
    println!("{}", Table::from(builder));
}
