//! Dashboard Route

use axum::{extract::State, http::StatusCode, response::Html};
use std::fmt::Write;
use std::sync::Arc;
use tracing::error;

use crate::AppState;
use storage::StoredRecord;

const HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Swing Stats Dashboard</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
th:first-child, td:first-child, td:last-child { text-align: left; }
.signal-on { color: #c0392b; font-weight: bold; }
.signal-off { color: #27ae60; }
</style>
</head>
<body>
<h1>Swing Stats</h1>
<table>
<tr><th>Name</th><th>Avg Bat Speed</th><th>Delta</th><th>Oscillator</th><th>Signal</th><th>Insight</th></tr>
"#;

const FOOTER: &str = "</table>\n</body>\n</html>\n";

/// Render the most recent records as an HTML table
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Html<String>, StatusCode> {
    let records = state
        .repository
        .recent(state.config.dashboard_limit)
        .await
        .map_err(|e| {
            error!("Failed to load dashboard records: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let column = state.pipeline.signal_column();
    let mut page = String::from(HEADER);
    for stored in &records {
        push_row(&mut page, stored, column, &state.presenter.insight(&stored.record));
    }
    page.push_str(FOOTER);

    Ok(Html(page))
}

fn push_row(page: &mut String, stored: &StoredRecord, column: &str, insight: &str) {
    let record = &stored.record;
    let class = if record.signal { "signal-on" } else { "signal-off" };

    // Writing to a String cannot fail
    let _ = writeln!(
        page,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td></tr>",
        escape_html(&record.name),
        format_value(record.metrics.avg_bat_speed),
        format_value(record.delta(column)),
        format_value(record.oscillator(column)),
        class,
        record.signal,
        escape_html(insight),
    );
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
