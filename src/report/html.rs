//! Renders the risk summary and high-value list as an HTML email body.

use crate::model::{Amount, AmountFormat};
use crate::report::aggregate::AggregateRow;
use crate::report::high_value::HighValueRecord;
use crate::report::summary;

const TABLE_OPEN: &str =
    r#"<table border="1" cellspacing="0" cellpadding="4" style="border-collapse:collapse">"#;

/// Escapes the characters that are significant in HTML text and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The full body: the summary table (stations then total) followed by the high-value list, if any.
pub fn render(title: &str, rows: &[AggregateRow], high_value: &[HighValueRecord]) -> String {
    let mut html = String::new();
    html.push_str(&format!("<html><body><h2>{}</h2>", escape(title)));
    html.push_str(&table(&summary::to_sheet_rows(rows, AmountFormat::CURRENCY)));

    if !high_value.is_empty() {
        html.push_str(&format!(
            "<h3>High-value shipments ({})</h3>",
            high_value.len()
        ));
        let mut hv_rows = vec![vec![
            "Key".to_string(),
            "Value".to_string(),
            "Source".to_string(),
        ]];
        hv_rows.extend(high_value.iter().map(|r| {
            vec![
                r.key().to_string(),
                Amount::new(r.value()).to_string(),
                r.source().to_string(),
            ]
        }));
        html.push_str(&table(&hv_rows));
    }
    html.push_str("</body></html>");
    html
}

/// A body for one station: the summary header row and that station's row only.
pub fn render_station(title: &str, row: &AggregateRow) -> String {
    let mut html = String::new();
    html.push_str(&format!("<html><body><h2>{}</h2>", escape(title)));
    let rows = summary::to_sheet_rows(std::slice::from_ref(row), AmountFormat::CURRENCY);
    html.push_str(&table(&rows));
    html.push_str("</body></html>");
    html
}

/// The first row is rendered as the header.
fn table(rows: &[Vec<String>]) -> String {
    let mut html = String::from(TABLE_OPEN);
    for (i, row) in rows.iter().enumerate() {
        let tag = if i == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<{tag}>{}</{tag}>", escape(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}
