//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without touching any real workbook.

use crate::api::sheet::parse_csv;
use crate::api::{Rows, Sheet};
use crate::Result;
use anyhow::Context;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// The worksheets of one in-memory workbook, keyed by worksheet name.
pub type TestSheetState = HashMap<String, Rows>;

/// Every in-memory workbook in the process, keyed by workbook name, so that separate `TestSheet`
/// handles to the same workbook see each other's writes.
static WORKBOOKS: LazyLock<Mutex<HashMap<String, TestSheetState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Sample worksheet names the seed data uses.
pub const SHORT_CASH: &str = "DSP Short Cash to be Submitted";
pub const OUTSTANDING_CASH: &str = "Outstanding Cash";
pub const PENDING_RTS: &str = "Pending RTS";

/// An implementation of the `Sheet` trait that keeps worksheets in memory. A workbook that has not
/// been used before is seeded with sample risk worksheets.
#[derive(Debug, Clone)]
pub struct TestSheet {
    workbook: String,
}

impl TestSheet {
    pub fn new(workbook: impl Into<String>) -> Self {
        let workbook = workbook.into();
        let mut books = lock();
        books.entry(workbook.clone()).or_insert_with(default_data);
        Self { workbook }
    }

    /// A copy of every worksheet in this workbook.
    pub fn get_state(&self) -> TestSheetState {
        lock().get(&self.workbook).cloned().unwrap_or_default()
    }

    /// Replaces every worksheet in this workbook.
    pub fn set_state(&self, state: TestSheetState) {
        lock().insert(self.workbook.clone(), state);
    }
}

fn lock() -> std::sync::MutexGuard<'static, HashMap<String, TestSheetState>> {
    WORKBOOKS.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, worksheet: &str) -> Result<Rows> {
        lock()
            .get(&self.workbook)
            .and_then(|book| book.get(worksheet))
            .cloned()
            .with_context(|| format!("Worksheet '{worksheet}' not found"))
    }

    async fn put(&mut self, worksheet: &str, rows: &[Vec<String>]) -> Result<()> {
        lock()
            .entry(self.workbook.clone())
            .or_default()
            .insert(worksheet.to_string(), rows.to_vec());
        Ok(())
    }

    async fn append(&mut self, worksheet: &str, rows: &[Vec<String>]) -> Result<()> {
        lock()
            .entry(self.workbook.clone())
            .or_default()
            .entry(worksheet.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }
}

/// Provides the seed data from this module.
fn default_data() -> TestSheetState {
    let mut map = HashMap::new();
    for (name, csv) in [
        (SHORT_CASH, SHORT_CASH_DATA),
        (OUTSTANDING_CASH, OUTSTANDING_CASH_DATA),
        (PENDING_RTS, PENDING_RTS_DATA),
    ] {
        // The seed constants are fixed, well-formed CSV.
        if let Ok(rows) = parse_csv(csv) {
            map.insert(name.to_string(), rows);
        }
    }
    map
}

/// Seed short cash data.
const SHORT_CASH_DATA: &str = r##"Station_Code,Employee_Name,Date,Short Amount
BLR01,Ravi Kumar,2025-10-14,"₹1,250.00"
BLR01,Anil Rao,2025-10-15,300
PNQ02,Sunita Patil,2025-10-15,(150)
DEL03,Mohit Singh,2025-10-16,"2,000"
XYZ99,Ghost Rider,2025-10-16,999
"##;

/// Seed outstanding cash data.
const OUTSTANDING_CASH_DATA: &str = r##"Station,Hub Type,Balance Due,Status
BLR01,DSP,"4,500.50",Open
PNQ02,eDSP,800,Open
DEL03,DSP,n/a,Disputed
"##;

/// Seed pending return-to-shipper data.
const PENDING_RTS_DATA: &str = r##"AWB No,Hub Code,Ageing Bucket,Shipment Value,Status
TRK1001,BLR01,>7 days,3000,RTO Initiated
TRK1002,PNQ02,3-7 days,1200,RTO Initiated
TRK1001,BLR01,>7 days,4500,RTO In Transit
TRK1003,DEL03,>15 days,"₹12,000",Lost
TRK1004,DEL03,0-2 days,,Pending
"##;
