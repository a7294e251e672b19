use serde_json::{Map, Value};
use std::io;

use super::{format_scalar, is_row_array, result_of, ROW_SECTIONS};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write the primary row set of the result as CSV.
///
/// Schedules emit their rows, annual breakdowns their years and portfolio
/// reports their CRD timeline. Results without a row set fall back to a
/// two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(result) => match primary_rows(result) {
            Some(rows) => write_rows(&mut wtr, rows),
            None => write_fields(&mut wtr, result),
        },
        Value::Array(rows) => write_rows(&mut wtr, rows),
        other => {
            let _ = wtr.write_record([format_scalar(other)]);
        }
    }

    let _ = wtr.flush();
}

fn primary_rows(result: &Map<String, Value>) -> Option<&[Value]> {
    ROW_SECTIONS
        .iter()
        .filter_map(|section| result.get(*section))
        .find(|rows| is_row_array(rows))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn write_fields(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in result {
        match val {
            Value::Object(inner) => {
                for (inner_key, inner_val) in inner {
                    let _ = wtr.write_record([format!("{key}.{inner_key}"), format_scalar(inner_val)]);
                }
            }
            _ => {
                let _ = wtr.write_record([key.clone(), format_scalar(val)]);
            }
        }
    }
}

fn write_rows(wtr: &mut StdoutWriter<'_>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([format_scalar(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_scalar).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}
