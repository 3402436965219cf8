//! Finds shipments whose value exceeds a threshold, one per tracking key.

use crate::model::{Amount, AmountFormat, Diagnostic, Diagnostics, Header, Outcome, Role};
use crate::report::merge::{MergedRow, MergedTable};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

/// A merged row that passed the threshold, with its key and value already resolved.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct HighValueRecord {
    key: String,
    value: Decimal,
    source: String,
    /// The row's cells keyed by the source's headers, in source column order.
    cells: Vec<(Header, String)>,
}

impl HighValueRecord {
    pub fn new(key: impl Into<String>, value: Decimal, source: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value,
            source: source.into(),
            cells: Vec::new(),
        }
    }

    fn from_row(key: &str, value: Decimal, row: &MergedRow<'_>) -> Self {
        let headers = row.source().table().headers();
        Self {
            key: key.to_string(),
            value,
            source: row.tag().to_string(),
            cells: headers
                .iter()
                .zip(row.record().values())
                .map(|(h, v)| (h.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// The provenance tag of the row this record came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn cells(&self) -> &[(Header, String)] {
        &self.cells
    }

    /// The cell of `header`, if the source had that column.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h.as_ref() == header)
            .map(|(_, v)| v.as_str())
    }
}

/// Keeps rows whose `value_role` exceeds `threshold`, one per `key_role`, highest value first.
///
/// Sources where either role did not resolve contribute nothing and are reported. Values that are
/// blank or do not parse are excluded rather than counted as zero, and so are rows with a blank
/// key.
pub fn extract(
    merged: &MergedTable,
    threshold: Decimal,
    key_role: Role,
    value_role: Role,
) -> Outcome<Vec<HighValueRecord>> {
    let mut diagnostics = Diagnostics::default();
    let mut candidates = Vec::new();

    for source in merged.sources() {
        let mut usable = true;
        for role in [key_role, value_role] {
            if source.resolution().get(role).is_none() {
                diagnostics.push(Diagnostic::UnresolvedColumn {
                    source: source.tag().to_string(),
                    role,
                });
                usable = false;
            }
        }
        if !usable {
            continue;
        }
        candidates.extend(
            merged
                .rows()
                .filter(|row| std::ptr::eq(row.source(), source))
                .filter_map(|row| {
                    let key = row.role(key_role)?.trim();
                    let raw = row.role(value_role)?;
                    if key.is_empty() || raw.trim().is_empty() {
                        return None;
                    }
                    let value = Amount::from_str(raw).ok()?.value();
                    (value > threshold).then(|| HighValueRecord::from_row(key, value, &row))
                }),
        );
    }

    diagnostics.finish(dedup(candidates))
}

/// Keeps the highest-value record per key, first seen on ties, then sorts by value descending.
/// Applying it to its own output changes nothing.
pub fn dedup(records: impl IntoIterator<Item = HighValueRecord>) -> Vec<HighValueRecord> {
    let mut best: Vec<HighValueRecord> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for record in records {
        match by_key.get(&record.key) {
            Some(&idx) => {
                if record.value > best[idx].value {
                    best[idx] = record;
                }
            }
            None => {
                by_key.insert(record.key.clone(), best.len());
                best.push(record);
            }
        }
    }
    best.sort_by(|a, b| b.value.cmp(&a.value));
    best
}

/// Renders records for a worksheet: key, value, source, then the union of the other columns in
/// first-seen order.
pub fn to_sheet_rows(records: &[HighValueRecord], format: AmountFormat) -> Vec<Vec<String>> {
    let mut extra: Vec<&str> = Vec::new();
    for record in records {
        for (header, _) in &record.cells {
            if !extra.contains(&header.as_ref()) {
                extra.push(header.as_ref());
            }
        }
    }
    let mut header = vec!["Key".to_string(), "Value".to_string(), "Source".to_string()];
    header.extend(extra.iter().map(|s| s.to_string()));

    let mut rows = vec![header];
    for record in records {
        let mut row = vec![
            record.key.clone(),
            Amount::new_with_format(record.value, format).to_string(),
            record.source.clone(),
        ];
        row.extend(
            extra
                .iter()
                .map(|h| record.get(h).unwrap_or_default().to_string()),
        );
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Table;
    use crate::report::merge::merge;
    use crate::report::resolver::ColumnRules;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn merged(tables: Vec<(Vec<Vec<&str>>, &str)>) -> MergedTable {
        let tables = tables
            .into_iter()
            .map(|(rows, tag)| (Table::parse(rows).unwrap(), tag.to_string()));
        merge(tables, &ColumnRules::default(), &[]).into_value()
    }

    fn run(m: &MergedTable) -> Outcome<Vec<HighValueRecord>> {
        extract(m, dec("2500"), Role::TrackingId, Role::Amount)
    }

    #[test]
    fn test_same_key_across_sources_keeps_max() {
        let m = merged(vec![
            (
                vec![vec!["Tracking ID", "Amount"], vec!["TRK1", "3000"]],
                "X",
            ),
            (
                vec![vec!["AWB", "COD Amount"], vec!["TRK1", "4500"], vec!["TRK2", "100"]],
                "Y",
            ),
        ]);
        let records = run(&m).into_value();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "TRK1");
        assert_eq!(records[0].value(), dec("4500"));
        assert_eq!(records[0].source(), "Y");
        assert_eq!(records[0].get("AWB"), Some("TRK1"));
    }

    #[test]
    fn test_sorted_descending_and_threshold_exclusive() {
        let m = merged(vec![(
            vec![
                vec!["Tracking ID", "Amount"],
                vec!["A", "2500"],
                vec!["B", "2600"],
                vec!["C", "₹9,000"],
                vec!["D", "3000"],
            ],
            "X",
        )]);
        let keys: Vec<String> = run(&m)
            .into_value()
            .iter()
            .map(|r| r.key().to_string())
            .collect();
        assert_eq!(keys, vec!["C", "D", "B"]);
    }

    #[test]
    fn test_unparseable_and_blank_are_excluded() {
        let m = merged(vec![(
            vec![
                vec!["Tracking ID", "Amount"],
                vec!["A", "lots"],
                vec!["B", ""],
                vec!["", "9000"],
                vec!["C", "2501"],
            ],
            "X",
        )]);
        let outcome = run(&m);
        assert!(!outcome.is_degraded());
        let records = outcome.into_value();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "C");
    }

    #[test]
    fn test_source_without_key_contributes_nothing() {
        let m = merged(vec![
            (vec![vec!["Station", "Amount"], vec!["A1", "9000"]], "NoKey"),
            (vec![vec!["Tracking ID", "Amount"], vec!["T", "9000"]], "Ok"),
        ]);
        let outcome = run(&m);
        assert_eq!(
            outcome.diagnostics(),
            &[Diagnostic::UnresolvedColumn {
                source: "NoKey".into(),
                role: Role::TrackingId
            }]
        );
        assert_eq!(outcome.value().len(), 1);
        assert_eq!(outcome.value()[0].source(), "Ok");
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let records = dedup(vec![
            HighValueRecord::new("K", dec("3000"), "first"),
            HighValueRecord::new("K", dec("3000"), "second"),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source(), "first");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let once = dedup(vec![
            HighValueRecord::new("A", dec("3000"), "x"),
            HighValueRecord::new("B", dec("5000"), "x"),
            HighValueRecord::new("A", dec("7000"), "y"),
            HighValueRecord::new("C", dec("5000"), "y"),
        ]);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
        let keys: Vec<&str> = once.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_sheet_rows() {
        let m = merged(vec![(
            vec![vec!["Tracking ID", "Amount", "Status"], vec!["T1", "3000", "RTO"]],
            "X",
        )]);
        let rows = to_sheet_rows(run(&m).value(), AmountFormat::CURRENCY);
        assert_eq!(
            rows[0],
            vec!["Key", "Value", "Source", "Tracking ID", "Amount", "Status"]
        );
        assert_eq!(rows[1], vec!["T1", "₹3,000.00", "X", "T1", "3000", "RTO"]);
        let plain = to_sheet_rows(run(&m).value(), AmountFormat::PLAIN);
        assert_eq!(plain[1][1], "3000.00");
    }
}
