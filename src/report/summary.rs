//! Orders the station rows for presentation and appends the grand total.

use crate::model::{Amount, AmountFormat, StationField};
use crate::report::aggregate::{AggregateRow, CategoryAmount, RowLabel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The label written in the first column of the total row.
pub const TOTAL_LABEL: &str = "TOTAL";

/// How station rows are ordered: primary field ascending, secondary field ascending by rank, then
/// total descending. Rows that tie on all three keep roster order.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SortOrder {
    primary: StationField,
    secondary: StationField,
    /// Explicit order for secondary values, compared case-insensitively. Listed values come
    /// first in list order; other values follow in lexical order.
    #[serde(default)]
    secondary_rank: Vec<String>,
}

impl SortOrder {
    pub fn new(
        primary: StationField,
        secondary: StationField,
        secondary_rank: Vec<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            secondary_rank,
        }
    }

    fn rank(&self, value: &str) -> Option<usize> {
        self.secondary_rank
            .iter()
            .position(|r| r.trim().eq_ignore_ascii_case(value.trim()))
    }

    fn compare_secondary(&self, a: &str, b: &str) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    fn compare(&self, a: &AggregateRow, b: &AggregateRow) -> Ordering {
        let (Some(sa), Some(sb)) = (a.station(), b.station()) else {
            return Ordering::Equal;
        };
        sa.field(self.primary)
            .cmp(sb.field(self.primary))
            .then_with(|| {
                self.compare_secondary(sa.field(self.secondary), sb.field(self.secondary))
            })
            .then_with(|| b.total().cmp(&a.total()))
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            primary: StationField::Region,
            secondary: StationField::HubType,
            secondary_rank: vec!["DSP".to_string(), "eDSP".to_string()],
        }
    }
}

/// Sorts the station rows and appends exactly one total row.
///
/// Any total rows already present in `rows` are discarded first. Every amount of the total row
/// is the sum of that amount over the station rows.
pub fn build_summary(rows: Vec<AggregateRow>, order: &SortOrder) -> Vec<AggregateRow> {
    let mut rows: Vec<AggregateRow> = rows.into_iter().filter(|r| !r.is_total()).collect();
    // `sort_by` is stable, which keeps roster order for full ties
    rows.sort_by(|a, b| order.compare(a, b));

    let total = total_row(&rows);
    rows.push(total);
    rows
}

fn total_row(rows: &[AggregateRow]) -> AggregateRow {
    let amounts = match rows.first() {
        None => Vec::new(),
        Some(first) => first
            .amounts()
            .iter()
            .map(|a| {
                let sum = rows
                    .iter()
                    .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.amount(a.category())));
                CategoryAmount::new(a.category(), sum)
            })
            .collect(),
    };
    AggregateRow::new(RowLabel::Total, amounts)
}

/// Renders summary rows for a worksheet: a header row, then one row per summary row with money
/// formatted for reading. The total row has `TOTAL` in its first column and blanks for the other
/// station fields.
pub fn to_sheet_rows(rows: &[AggregateRow], format: AmountFormat) -> Vec<Vec<String>> {
    let mut header: Vec<String> = ["Station Code", "City", "Region", "Hub Type", "Managers"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if let Some(first) = rows.first() {
        header.extend(first.amounts().iter().map(|a| a.category().to_string()));
    }
    header.push("Total".to_string());

    let money = |d: Decimal| Amount::new_with_format(d, format).to_string();
    let mut out = vec![header];
    for row in rows {
        let mut values = match row.label() {
            RowLabel::Station(s) => vec![
                s.code().to_string(),
                s.city().to_string(),
                s.region().to_string(),
                s.hub_type().to_string(),
                s.managers().join(", "),
            ],
            RowLabel::Total => vec![
                TOTAL_LABEL.to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ],
        };
        values.extend(row.amounts().iter().map(|a| money(a.amount())));
        values.push(money(row.total()));
        out.push(values);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Station;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(code: &str, region: &str, hub: &str, short: &str, returns: &str) -> AggregateRow {
        AggregateRow::new(
            RowLabel::Station(Station::new(code, region, hub)),
            vec![
                CategoryAmount::new("short_cash", dec(short)),
                CategoryAmount::new("pending_returns", dec(returns)),
            ],
        )
    }

    fn codes(rows: &[AggregateRow]) -> Vec<&str> {
        rows.iter()
            .map(|r| r.station().map(|s| s.code()).unwrap_or(TOTAL_LABEL))
            .collect()
    }

    #[test]
    fn test_sort_keys() {
        let rows = vec![
            row("E1", "South", "eDSP", "500", "0"),
            row("D1", "South", "DSP", "10", "0"),
            row("D2", "South", "DSP", "90", "0"),
            row("N1", "North", "eDSP", "1", "0"),
            row("X1", "North", "Franchise", "1000", "0"),
        ];
        let summary = build_summary(rows, &SortOrder::default());
        assert_eq!(codes(&summary), vec!["N1", "X1", "D2", "D1", "E1", "TOTAL"]);
    }

    #[test]
    fn test_stable_for_full_ties() {
        let rows = vec![
            row("B", "North", "DSP", "10", "0"),
            row("A", "North", "DSP", "10", "0"),
            row("C", "North", "DSP", "10", "0"),
        ];
        let summary = build_summary(rows, &SortOrder::default());
        assert_eq!(codes(&summary), vec!["B", "A", "C", "TOTAL"]);
    }

    #[test]
    fn test_total_row() {
        let rows = vec![
            row("A1", "North", "DSP", "130", "5.5"),
            row("B2", "North", "DSP", "0", "4.5"),
        ];
        let summary = build_summary(rows, &SortOrder::default());
        assert_eq!(summary.len(), 3);
        let total = summary.last().unwrap();
        assert!(total.is_total());
        assert_eq!(total.amount("short_cash"), dec("130"));
        assert_eq!(total.amount("pending_returns"), dec("10"));
        let sum: Decimal = summary[..2].iter().map(|r| r.total()).sum();
        assert_eq!(total.total(), sum);
    }

    #[test]
    fn test_resummarizing_keeps_one_total() {
        let rows = vec![row("A1", "North", "DSP", "1", "2")];
        let once = build_summary(rows, &SortOrder::default());
        let twice = build_summary(once.clone(), &SortOrder::default());
        assert_eq!(once, twice);
        assert_eq!(twice.iter().filter(|r| r.is_total()).count(), 1);
    }

    #[test]
    fn test_custom_rank() {
        let order = SortOrder::new(
            StationField::Region,
            StationField::HubType,
            vec!["eDSP".into(), "DSP".into()],
        );
        let rows = vec![
            row("D1", "South", "DSP", "10", "0"),
            row("E1", "South", "edsp", "1", "0"),
        ];
        let summary = build_summary(rows, &order);
        assert_eq!(codes(&summary), vec!["E1", "D1", "TOTAL"]);
    }

    #[test]
    fn test_sheet_rows() {
        let rows = build_summary(
            vec![row("A1", "North", "DSP", "1234.5", "0")],
            &SortOrder::default(),
        );
        let sheet = to_sheet_rows(&rows, AmountFormat::CURRENCY);
        assert_eq!(
            sheet[0],
            vec![
                "Station Code",
                "City",
                "Region",
                "Hub Type",
                "Managers",
                "short_cash",
                "pending_returns",
                "Total"
            ]
        );
        assert_eq!(sheet[1][0], "A1");
        assert_eq!(sheet[1][5], "₹1,234.50");
        assert_eq!(sheet[2][0], "TOTAL");
        assert_eq!(sheet[2][2], "");
        assert_eq!(sheet[2][7], "₹1,234.50");
    }
}
