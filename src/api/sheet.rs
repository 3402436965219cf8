//! Implements the `Sheet` trait over a directory that holds one CSV file per worksheet.

use crate::api::{Rows, Sheet};
use crate::{utils, Result};
use anyhow::Context;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::trace;

/// A workbook stored as `{dir}/{worksheet}.csv` files. Worksheets are read without treating the
/// first row specially, and rows may have differing lengths.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file that holds `worksheet`. Path separators in the name are replaced.
    pub fn path(&self, worksheet: &str) -> PathBuf {
        let name: String = worksheet
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.csv"))
    }
}

#[async_trait::async_trait]
impl Sheet for CsvWorkbook {
    async fn get(&mut self, worksheet: &str) -> Result<Rows> {
        let path = self.path(worksheet);
        trace!("get for {worksheet} from {}", path.display());
        let data = utils::read(&path).await?;
        parse_csv(&data).with_context(|| format!("Unable to parse {}", path.display()))
    }

    async fn put(&mut self, worksheet: &str, rows: &[Vec<String>]) -> Result<()> {
        let path = self.path(worksheet);
        trace!("put {} rows to {}", rows.len(), path.display());
        utils::make_dir(&self.dir).await?;
        utils::write(&path, to_csv(rows)?).await
    }

    async fn append(&mut self, worksheet: &str, rows: &[Vec<String>]) -> Result<()> {
        let path = self.path(worksheet);
        let mut existing = if path.is_file() {
            self.get(worksheet).await?
        } else {
            Vec::new()
        };
        existing.extend_from_slice(rows);
        self.put(worksheet, &existing).await
    }
}

/// Parses CSV text into rows, without a header row.
pub(crate) fn parse_csv(data: &str) -> Result<Rows> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(data.as_bytes()));

    let mut rows: Rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Renders rows as CSV text.
pub(crate) fn to_csv(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        wtr.write_record(row).context("Unable to write CSV record")?;
    }
    wtr.into_inner().context("Unable to flush CSV data")
}
