//! Result rendering.
//!
//! Every tool answers with one text block. Row results become an ASCII
//! table framed by an instance header and a row-count trailer; commands
//! become a short report with the executed SQL.

use crate::db::sql::Plan;
use crate::models::{InstanceConfig, Operation, OperationOutput, OperationResult};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Render the output of one operation.
pub fn render(
    instance: &InstanceConfig,
    database: Option<&str>,
    operation: &Operation,
    plan: &Plan,
    output: &OperationOutput,
) -> String {
    match output {
        OperationOutput::Rows(result) => render_rows(instance, database, plan, result),
        OperationOutput::Affected { rows_affected } => {
            let mut out = format!("[{}] {}\n", instance.label, plan.title);
            if let Some(database) = database {
                out.push_str(&format!("Database: {}\n", database));
            }
            if reports_affected_rows(operation) {
                out.push_str(&format!("Affected rows: {}\n", rows_affected));
            }
            out.push_str(&format!("SQL: {}", plan.statement.sql));
            out
        }
    }
}

/// DDL reports zero affected rows on most engines, so only DML shows a count.
fn reports_affected_rows(operation: &Operation) -> bool {
    matches!(
        operation,
        Operation::DeleteRows { .. } | Operation::ExecuteQuery { .. }
    )
}

fn render_rows(
    instance: &InstanceConfig,
    database: Option<&str>,
    plan: &Plan,
    result: &OperationResult,
) -> String {
    let mut out = format!(
        "[{}] Database: {}\n{}\n",
        instance.label,
        database.unwrap_or("default"),
        plan.title
    );
    out.push_str(&format_as_table(&result.columns, &result.rows));

    let shown = result.rows.len();
    if result.truncated {
        out.push_str(&format!(
            "{} {} shown, more rows matched (truncated at max_rows={})",
            shown,
            plural(shown),
            instance.max_rows
        ));
    } else {
        out.push_str(&format!("{} {}", shown, plural(shown)));
    }
    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "row" } else { "rows" }
}

/// Render a cell value. Control characters are escaped so a value never
/// breaks the table layout.
pub fn format_value(value: &JsonValue) -> String {
    let text = match value {
        JsonValue::Null => return "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    };
    if text.chars().any(char::is_control) {
        text.chars()
            .map(|c| match c {
                '\n' => "\\n".to_string(),
                '\r' => "\\r".to_string(),
                '\t' => "\\t".to_string(),
                c if c.is_control() => c.escape_unicode().to_string(),
                c => c.to_string(),
            })
            .collect()
    } else {
        text
    }
}

/// ASCII table with a header row. Numbers are right-aligned.
///
/// Returns an empty string when there are no columns to show.
pub fn format_as_table(columns: &[String], rows: &[Vec<JsonValue>]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            (0..columns.len())
                .map(|i| format_value(row.get(i).unwrap_or(&JsonValue::Null)))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    for (name, w) in columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(name, *w, false)));
    }
    output.push_str("|\n");
    output.push_str(&separator);

    for (row, raw) in cells.iter().zip(rows) {
        for (i, cell) in row.iter().enumerate() {
            let numeric = matches!(raw.get(i), Some(JsonValue::Number(_)));
            output.push_str(&format!("| {} ", pad(cell, widths[i], numeric)));
        }
        output.push_str("|\n");
    }
    if !rows.is_empty() {
        output.push_str(&separator);
    }
    output
}

/// Pad by display width; `format!` width specifiers count chars, not columns.
fn pad(text: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}
