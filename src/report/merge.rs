//! Combines the tables of several worksheets into one table, remembering where each row came from.

use crate::model::{Diagnostic, Diagnostics, Header, Mapping, Outcome, Record, Role, Table};
use crate::report::resolver::{ColumnRules, Resolution};
use serde::Serialize;
use tracing::debug;

/// The header of the provenance column when a merged table is written out.
pub const SOURCE_HEADER: &str = "Source";

/// One input table of a merge, with its provenance tag and its own column resolution.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    tag: String,
    table: Table,
    resolution: Resolution,
}

impl Source {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }
}

/// A row of the merged table: the index of its source and the row as it appeared there.
#[derive(Debug, Clone, Copy)]
pub struct MergedRow<'a> {
    source: &'a Source,
    /// 0-based row index within the source's data rows.
    index: usize,
    record: &'a Record,
}

impl<'a> MergedRow<'a> {
    /// The provenance tag of this row.
    pub fn tag(&self) -> &'a str {
        &self.source.tag
    }

    pub fn source(&self) -> &'a Source {
        self.source
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    /// The cell of `header`, or `""` if this row's source has no such column.
    pub fn get(&self, header: &Header) -> &'a str {
        self.source.table.get(self.record, header).unwrap_or_default()
    }

    /// The cell of the column `role` resolved to in this row's source. `None` means the role did
    /// not resolve for the source, which is different from a blank cell.
    pub fn role(&self, role: Role) -> Option<&'a str> {
        self.source
            .resolution
            .get(role)
            .and_then(|header| self.source.table.get(self.record, header))
    }
}

/// The concatenation of several tagged tables.
///
/// Rows keep the caller's order: every row of the first source, then every row of the second,
/// and so on. The header set is the union of the source headers in first-seen order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedTable {
    headers: Mapping,
    sources: Vec<Source>,
}

impl MergedTable {
    pub fn headers(&self) -> &[Header] {
        self.headers.headers()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.iter().map(|s| s.table.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> impl Iterator<Item = MergedRow<'_>> + '_ {
        self.sources.iter().flat_map(|source| {
            source
                .table
                .records()
                .iter()
                .enumerate()
                .map(move |(index, record)| MergedRow {
                    source,
                    index,
                    record,
                })
        })
    }

    /// Renders the merged table as worksheet rows: the union headers plus a trailing
    /// [`SOURCE_HEADER`] column holding each row's provenance tag.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut header_row: Vec<String> = self
            .headers()
            .iter()
            .map(|h| h.as_ref().to_string())
            .collect();
        header_row.push(SOURCE_HEADER.to_string());

        let mut rows = vec![header_row];
        for row in self.rows() {
            let mut values: Vec<String> = self
                .headers()
                .iter()
                .map(|h| row.get(h).to_string())
                .collect();
            values.push(row.tag().to_string());
            rows.push(values);
        }
        rows
    }
}

/// Concatenates `tables` in order, tagging every row with its table's tag.
///
/// Each table's headers are resolved against `rules` on their own before merging. Any role in
/// `required` that does not resolve for a table is reported as a diagnostic; the rows are still
/// merged.
pub fn merge<I, S>(tables: I, rules: &ColumnRules, required: &[Role]) -> Outcome<MergedTable>
where
    I: IntoIterator<Item = (Table, S)>,
    S: Into<String>,
{
    let mut diagnostics = Diagnostics::default();
    let mut merged = MergedTable::default();

    for (table, tag) in tables {
        let tag = tag.into();
        for header in table.headers() {
            if !merged.headers.contains(header) {
                merged.headers.push(header.as_ref());
            }
        }
        let resolution = rules.resolve_all(table.headers());
        for (role, header) in resolution.iter() {
            debug!("'{tag}': {role} -> '{}'", header.as_ref());
        }
        for role in resolution.misses(required) {
            diagnostics.push(Diagnostic::UnresolvedColumn {
                source: tag.clone(),
                role,
            });
        }
        merged.sources.push(Source {
            tag,
            table,
            resolution,
        });
    }

    debug!(
        "Merged {} rows from {} sources",
        merged.len(),
        merged.sources.len()
    );
    diagnostics.finish(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: Vec<Vec<&str>>) -> Table {
        Table::parse(rows).unwrap()
    }

    fn rows_of(header: Vec<&'static str>, n: usize, prefix: &str) -> Vec<Vec<String>> {
        let mut rows = vec![header.into_iter().map(String::from).collect::<Vec<_>>()];
        for i in 0..n {
            rows.push(vec![format!("{prefix}{i}"), format!("{}", i * 10)]);
        }
        rows
    }

    #[test]
    fn test_row_count_and_tags() {
        let x = Table::parse(rows_of(vec!["Station", "Amount"], 5, "X")).unwrap();
        let y = Table::parse(rows_of(vec!["Station Code", "COD Amount"], 7, "Y")).unwrap();
        let merged = merge(vec![(x, "X"), (y, "Y")], &ColumnRules::default(), &[]).into_value();

        assert_eq!(merged.len(), 12);
        let tags: Vec<&str> = merged.rows().map(|r| r.tag()).collect();
        assert_eq!(&tags[..5], &["X"; 5]);
        assert_eq!(&tags[5..], &["Y"; 7]);
        let first_y = merged.rows().nth(5).unwrap();
        assert_eq!(first_y.index(), 0);
        assert_eq!(first_y.role(Role::StationCode), Some("Y0"));
    }

    #[test]
    fn test_union_headers_and_missing_cells() {
        let a = table(vec![vec!["Station", "Amount"], vec!["A1", "10"]]);
        let b = table(vec![vec!["Amount", "Status"], vec!["20", "Open"]]);
        let merged = merge(vec![(a, "a"), (b, "b")], &ColumnRules::default(), &[]).into_value();

        let names: Vec<&str> = merged.headers().iter().map(|h| h.as_ref()).collect();
        assert_eq!(names, vec!["Station", "Amount", "Status"]);

        let rows = merged.to_rows();
        assert_eq!(rows[0], vec!["Station", "Amount", "Status", "Source"]);
        assert_eq!(rows[1], vec!["A1", "10", "", "a"]);
        assert_eq!(rows[2], vec!["", "20", "Open", "b"]);
    }

    #[test]
    fn test_resolution_is_per_source() {
        let a = table(vec![vec!["Station", "Short Amount"], vec!["A1", "10"]]);
        let b = table(vec![vec!["Hub", "Balance"], vec!["A1", "20"]]);
        let merged = merge(vec![(a, "a"), (b, "b")], &ColumnRules::default(), &[]).into_value();
        let amounts: Vec<Option<&str>> = merged.rows().map(|r| r.role(Role::Amount)).collect();
        assert_eq!(amounts, vec![Some("10"), Some("20")]);
    }

    #[test]
    fn test_required_role_misses_are_reported() {
        let a = table(vec![vec!["Station", "Remarks"], vec!["A1", "late"]]);
        let outcome = merge(
            vec![(a, "a")],
            &ColumnRules::default(),
            &[Role::Amount, Role::StationCode],
        );
        assert_eq!(
            outcome.diagnostics(),
            &[Diagnostic::UnresolvedColumn {
                source: "a".into(),
                role: Role::Amount
            }]
        );
        assert_eq!(outcome.value().len(), 1);
    }

    #[test]
    fn test_no_deduplication() {
        let a = table(vec![vec!["Station", "Amount"], vec!["A1", "10"], vec!["A1", "10"]]);
        let merged = merge(vec![(a.clone(), "a"), (a, "a")], &ColumnRules::default(), &[]);
        assert_eq!(merged.value().len(), 4);
    }
}
