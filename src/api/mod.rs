//! The collaborators the report talks to: a spreadsheet service and a notification service.
//!
//! Both are async traits so that the commands can run against a directory of CSV files, an
//! in-memory test workbook, or anything else that can read and write rows.

mod outbox;
mod sheet;
mod sheet_test_client;

use crate::model::Table;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, trace};

pub use outbox::Outbox;
pub use sheet::CsvWorkbook;
pub(crate) use sheet::to_csv;
pub use sheet_test_client::{TestSheet, TestSheetState, OUTSTANDING_CASH, PENDING_RTS, SHORT_CASH};

/// The environment variable that switches the app onto the in-memory `TestSheet`.
pub const TEST_MODE_ENV: &str = "COD_RISK_IN_TEST_MODE";

/// Rows of cells as delivered by a spreadsheet service. The first row is the header row.
pub type Rows = Vec<Vec<String>>;

/// A spreadsheet service: a named collection of worksheets.
#[async_trait::async_trait]
pub trait Sheet {
    /// Reads every row of `worksheet`.
    async fn get(&mut self, worksheet: &str) -> Result<Rows>;

    /// Replaces the contents of `worksheet` with `rows`, creating it if needed.
    async fn put(&mut self, worksheet: &str, rows: &[Vec<String>]) -> Result<()>;

    /// Adds `rows` to the end of `worksheet`, creating it if needed.
    async fn append(&mut self, worksheet: &str, rows: &[Vec<String>]) -> Result<()>;
}

/// A message for the notification service.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Notification {
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    html: String,
}

impl Notification {
    pub fn new(to: Vec<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to,
            cc: Vec::new(),
            subject: subject.into(),
            html: html.into(),
        }
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// A notification service. Delivery is attempted once.
#[async_trait::async_trait]
pub trait Notifier {
    async fn send(&mut self, notification: &Notification) -> Result<()>;
}

/// Which `Sheet` implementation backs a workbook.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// A directory with one CSV file per worksheet.
    #[default]
    Csv,
    /// The in-memory `TestSheet`, seeded with sample data.
    Test,
}

impl Mode {
    /// `Mode::Test` when `COD_RISK_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Csv`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Csv,
        }
    }
}

/// Opens the workbook at `path` using the implementation chosen by `mode`.
pub fn sheet(path: &Path, mode: Mode) -> Box<dyn Sheet + Send> {
    debug!("Opening workbook '{}' in {mode:?} mode", path.display());
    match mode {
        Mode::Csv => Box::new(CsvWorkbook::new(path)),
        Mode::Test => Box::new(TestSheet::new(path.to_string_lossy())),
    }
}

/// Reads `worksheet` and parses it into a `Table`.
pub async fn fetch_table(sheet: &mut (dyn Sheet + Send), worksheet: &str) -> Result<Table> {
    trace!("fetch_table for {worksheet}");
    let rows = sheet
        .get(worksheet)
        .await
        .with_context(|| format!("Unable to read worksheet '{worksheet}'"))?;
    Table::parse(rows).with_context(|| format!("Worksheet '{worksheet}' is malformed"))
}
