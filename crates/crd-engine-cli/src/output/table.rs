use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_scalar, is_row_array, result_of, ROW_SECTIONS};

/// Format output as tables: result scalars first, then one table per row set.
pub fn print_table(value: &Value) {
    match result_of(value) {
        Value::Object(result) => print_result(result),
        Value::Array(rows) => print_rows(rows),
        other => println!("{}", format_scalar(other)),
    }

    if let Value::Object(envelope) = value {
        print_notes(envelope);
    }
}

fn print_result(result: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut fields = 0usize;

    for (key, val) in result {
        match val {
            Value::Array(_) if is_row_array(val) => {}
            // One level of nesting (e.g. a schedule summary) reads as dotted fields
            Value::Object(inner) => {
                for (inner_key, inner_val) in inner {
                    builder.push_record([format!("{key}.{inner_key}"), format_cell(inner_val)]);
                    fields += 1;
                }
            }
            _ => {
                builder.push_record([key.clone(), format_cell(val)]);
                fields += 1;
            }
        }
    }

    if fields > 0 {
        println!("{}", Table::from(builder));
    }

    for section in ROW_SECTIONS {
        if let Some(Value::Array(rows)) = result.get(section) {
            println!("\n{section}:");
            print_rows(rows);
        }
    }
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        if rows.is_empty() {
            println!("(empty)");
        }
        for item in rows {
            println!("{}", format_cell(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h).map(format_cell).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}

fn print_notes(envelope: &Map<String, Value>) {
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

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Array(items) => items.iter().map(format_cell).collect::<Vec<_>>().join(", "),
        other => format_scalar(other),
    }
}
