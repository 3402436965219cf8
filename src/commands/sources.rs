//! Reading the source worksheets and writing results back, shared by the report commands.

use crate::api::{fetch_table, Sheet};
use crate::backup::{today, Backup, SOURCES};
use crate::model::{Amount, AmountFormat, Diagnostic, Diagnostics, Table};
use crate::report::HighValueRecord;
use crate::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, warn};

/// The header row written when the high-value log is started.
pub(super) const LOG_HEADER: [&str; 4] = ["Key", "Date", "Value", "Source"];

/// A source table paired with its provenance tag, which is its worksheet name.
pub(super) type Tagged = (Table, String);

/// Reads every worksheet in `worksheets`. Any failure is fatal.
pub(super) async fn read_required(
    sheet: &mut (dyn Sheet + Send),
    worksheets: &[String],
) -> Result<Vec<Tagged>> {
    let mut tables = Vec::with_capacity(worksheets.len());
    for worksheet in worksheets {
        let table = fetch_table(sheet, worksheet).await?;
        debug!("Read {} rows from '{worksheet}'", table.len());
        tables.push((table, worksheet.clone()));
    }
    Ok(tables)
}

/// Reads each worksheet in `worksheets` on its own. A worksheet that cannot be read is recorded
/// as unavailable and skipped.
pub(super) async fn read_optional(
    sheet: &mut (dyn Sheet + Send),
    worksheets: &[String],
    diagnostics: &mut Diagnostics,
) -> Vec<Tagged> {
    let mut tables = Vec::new();
    for worksheet in worksheets {
        match fetch_table(sheet, worksheet).await {
            Ok(table) => tables.push((table, worksheet.clone())),
            Err(e) => diagnostics.push(Diagnostic::SourceUnavailable {
                source: worksheet.clone(),
                reason: format!("{e:#}"),
            }),
        }
    }
    tables
}

#[derive(Serialize)]
struct SnapshotEntry<'a> {
    worksheet: &'a str,
    table: &'a Table,
}

/// Saves the raw source tables to `.backups/sources.YYYY-MM-DD-NNN.json`.
pub(super) async fn snapshot(backup: &Backup, tables: &[Tagged]) -> Result<PathBuf> {
    let entries: Vec<SnapshotEntry<'_>> = tables
        .iter()
        .map(|(table, worksheet)| SnapshotEntry { worksheet, table })
        .collect();
    let path = backup.save_json(SOURCES, &entries).await?;
    debug!("Saved source snapshot to {}", path.display());
    Ok(path)
}

/// Replaces `worksheet` with `rows`. When the write fails, the rows are saved as a CSV file in
/// the backups directory instead and its path is returned. Only a failing fallback is an error.
pub(super) async fn write_or_fallback(
    sheet: &mut (dyn Sheet + Send),
    backup: &Backup,
    worksheet: &str,
    rows: &[Vec<String>],
) -> Result<Option<PathBuf>> {
    match sheet.put(worksheet, rows).await {
        Ok(()) => {
            debug!("Wrote {} rows to '{worksheet}'", rows.len());
            Ok(None)
        }
        Err(e) => {
            error!("Unable to write '{worksheet}': {e:#}");
            let path = backup.save_csv(worksheet, rows).await?;
            warn!("Saved '{worksheet}' to {} instead", path.display());
            Ok(Some(path))
        }
    }
}

/// Appends the records whose key is not already in the first column of `log_worksheet`, each
/// with today's date. A log that cannot be read is treated as empty. Returns the number of rows
/// appended.
pub(super) async fn append_log(
    sheet: &mut (dyn Sheet + Send),
    log_worksheet: &str,
    records: &[HighValueRecord],
) -> Result<usize> {
    let existing = match sheet.get(log_worksheet).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Unable to read '{log_worksheet}', treating it as empty: {e:#}");
            Vec::new()
        }
    };
    let logged: HashSet<&str> = existing
        .iter()
        .filter_map(|row| row.first())
        .map(|key| key.trim())
        .collect();

    let date = today();
    let mut rows: Vec<Vec<String>> = Vec::new();
    if existing.is_empty() {
        rows.push(LOG_HEADER.iter().map(|s| s.to_string()).collect());
    }
    let new_rows: Vec<Vec<String>> = records
        .iter()
        .filter(|record| !logged.contains(record.key()))
        .map(|record| {
            vec![
                record.key().to_string(),
                date.clone(),
                Amount::new_with_format(record.value(), AmountFormat::PLAIN).to_string(),
                record.source().to_string(),
            ]
        })
        .collect();
    let appended = new_rows.len();
    if appended == 0 {
        debug!("No new keys for '{log_worksheet}'");
        return Ok(0);
    }
    rows.extend(new_rows);
    sheet.append(log_worksheet, &rows).await?;
    Ok(appended)
}
