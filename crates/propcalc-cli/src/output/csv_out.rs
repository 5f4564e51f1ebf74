use serde_json::Value;
use std::io;

use super::{format_cell, result_of, row_set};

/// Write a result as CSV: its row set when it has one (one line per
/// period / strategy / scenario), otherwise field,value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(result) => match row_set(result) {
            Some((_, rows)) => write_rows(&mut wtr, rows),
            None => {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in result {
                    let _ = wtr.write_record([key.as_str(), &format_cell(val)]);
                }
            }
        },
        Value::Array(rows) => write_rows(&mut wtr, rows),
        other => {
            let _ = wtr.write_record([&format_cell(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([&format_cell(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for map in rows.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(*h).map(format_cell).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&row);
    }
}
