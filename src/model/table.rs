use crate::model::{Header, Mapping};
use crate::Result;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The rows of one worksheet together with its header mapping.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Table {
    mapping: Mapping,
    records: Vec<Record>,
}

/// One data row. Values are aligned with the owning table's headers; a missing or blank cell is
/// treated as empty.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn new<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The cell at column `idx`, or `""` if the row is shorter than that.
    pub fn value(&self, idx: usize) -> &str {
        self.values.get(idx).map(String::as_str).unwrap_or_default()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }
}

impl Table {
    /// Given the downloaded rows of a worksheet, treat the first row as headers and the rest as
    /// data.
    ///
    /// - Rows that are entirely blank are skipped.
    /// - Short rows are padded with empty cells.
    /// - Cells past the last header have no column and are dropped.
    pub fn parse<S, R, I>(sheet_data: I) -> Result<Self>
    where
        S: Into<String>,
        R: IntoIterator<Item = S>,
        I: IntoIterator<Item = R>,
    {
        let mut rows = sheet_data.into_iter();
        let mapping = match rows.next() {
            Some(header_row) => Mapping::new(header_row),
            None => bail!("An empty data set cannot be parsed into a Table"),
        };

        let len = mapping.len();
        let mut records = Vec::new();
        for (row_ix, row) in rows.enumerate() {
            let mut values: Vec<String> = row.into_iter().map(|s| s.into()).collect();
            if values.len() > len {
                let dropped = values.split_off(len);
                if dropped.iter().any(|v| !v.trim().is_empty()) {
                    debug!(
                        "Dropped {} cells past the last header at row {}",
                        dropped.len(),
                        row_ix + 2
                    );
                }
            }
            values.resize(len, String::new());
            let record = Record { values };
            if record.is_blank() {
                continue;
            }
            records.push(record);
        }
        Ok(Self { mapping, records })
    }

    /// Creates a table from an already-built mapping and records.
    pub fn new(mapping: Mapping, records: Vec<Record>) -> Self {
        Self { mapping, records }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn headers(&self) -> &[Header] {
        self.mapping.headers()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The value of `header` in `record`, or `None` if this table has no such column.
    pub fn get<'a>(&self, record: &'a Record, header: &Header) -> Option<&'a str> {
        self.mapping.index(header).map(|idx| record.value(idx))
    }

    /// Converts the table back into rows suitable for writing to a worksheet, headers first.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.records.len() + 1);
        rows.push(
            self.headers()
                .iter()
                .map(|h| h.as_ref().to_string())
                .collect(),
        );
        rows.extend(self.records.iter().map(|r| r.values.clone()));
        rows
    }
}
