//! Backup management for local snapshots of source data and for writes that could not reach the
//! report workbook.

use crate::api::to_csv;
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;

/// Prefix for the snapshot of the raw source tables taken before each report.
pub const SOURCES: &str = "sources";

/// Manages backup file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
}

impl Backup {
    /// Creates a new `Backup` instance from a `Config`.
    pub fn new(config: &Config) -> Self {
        Self {
            backups_dir: config.backups().to_path_buf(),
            backup_copies: config.backup_copies(),
        }
    }

    /// Saves `data` as a pretty-printed JSON backup file.
    ///
    /// The filename format is `{prefix}.YYYY-MM-DD-NNN.json` where NNN is a sequence number.
    /// Automatically rotates old backups, keeping only `backup_copies` files.
    ///
    /// Returns the path to the created backup file.
    pub async fn save_json<T: Serialize>(&self, prefix: &str, data: &T) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Failed to serialize '{prefix}' backup to JSON"))?;
        self.save(prefix, "json", json.into_bytes()).await
    }

    /// Saves worksheet rows as a CSV file named `{prefix}.YYYY-MM-DD-NNN.csv`, where `prefix` is
    /// derived from `worksheet`. Used when a worksheet write fails.
    ///
    /// Returns the path to the created file.
    pub async fn save_csv(&self, worksheet: &str, rows: &[Vec<String>]) -> Result<PathBuf> {
        let prefix = file_prefix(worksheet);
        self.save(&prefix, "csv", to_csv(rows)?).await
    }

    async fn save(&self, prefix: &str, extension: &str, data: Vec<u8>) -> Result<PathBuf> {
        utils::make_dir(&self.backups_dir).await?;
        let date = today();
        let seq = self.next_sequence_number(prefix, &date, extension).await?;
        let filename = format!("{prefix}.{date}-{seq:03}.{extension}");
        let path = self.backups_dir.join(&filename);

        utils::write(&path, data).await?;

        self.rotate(prefix, extension).await?;

        Ok(path)
    }

    /// Scans the backups directory for existing files with the given prefix and date,
    /// and returns the next sequence number.
    async fn next_sequence_number(&self, prefix: &str, date: &str, extension: &str) -> Result<u32> {
        let pattern_start = format!("{prefix}.{date}-");
        let mut max_seq: u32 = 0;

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            if name.starts_with(&pattern_start) {
                if let Some(seq) = parse_sequence_number(&name, prefix, date, extension) {
                    max_seq = max_seq.max(seq);
                }
            }
        }

        Ok(max_seq + 1)
    }

    /// Rotates old backup files, keeping only `backup_copies` files with the given prefix.
    async fn rotate(&self, prefix: &str, extension: &str) -> Result<()> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy().to_string();

            if is_backup_file(&name, prefix, extension) {
                files.push((entry.path(), name));
            }
        }

        // Sort by filename (which sorts by date and sequence number due to format)
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            utils::remove(&path).await?;
        }

        Ok(())
    }
}

/// Returns today's date in YYYY-MM-DD format.
pub(crate) fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Lower-cases a worksheet name and turns anything that is not alphanumeric into `-`.
fn file_prefix(worksheet: &str) -> String {
    let slug: Vec<String> = worksheet
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect();
    if slug.is_empty() {
        "worksheet".to_string()
    } else {
        slug.join("-")
    }
}

/// Parses the sequence number from a backup filename.
/// Returns None if the filename doesn't match the expected pattern.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str, extension: &str) -> Option<u32> {
    // Pattern: {prefix}.{date}-{NNN}.{ext}
    let remainder = filename.strip_prefix(&format!("{prefix}.{date}-"))?;
    remainder
        .strip_suffix(&format!(".{extension}"))?
        .parse()
        .ok()
}

/// Checks if a filename is a backup file with the given prefix and extension.
fn is_backup_file(filename: &str, prefix: &str, extension: &str) -> bool {
    let Some(rest) = filename.strip_prefix(&format!("{prefix}.")) else {
        return false;
    };
    // The date must follow directly, so `sources` does not match `sources.extra.*`
    rest.starts_with(|c: char| c.is_ascii_digit()) && filename.ends_with(&format!(".{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backup(dir: &TempDir, copies: u32) -> Backup {
        Backup {
            backups_dir: dir.path().join(".backups"),
            backup_copies: copies,
        }
    }

    #[test]
    fn test_parse_sequence_number() {
        assert_eq!(
            parse_sequence_number("sources.2025-12-14-001.json", "sources", "2025-12-14", "json"),
            Some(1)
        );
        assert_eq!(
            parse_sequence_number(
                "risk-summary.2025-12-14-042.csv",
                "risk-summary",
                "2025-12-14",
                "csv"
            ),
            Some(42)
        );
        // Wrong extension
        assert_eq!(
            parse_sequence_number("sources.2025-12-14-001.csv", "sources", "2025-12-14", "json"),
            None
        );
        // Wrong date
        assert_eq!(
            parse_sequence_number("sources.2025-12-13-001.json", "sources", "2025-12-14", "json"),
            None
        );
    }

    #[test]
    fn test_is_backup_file() {
        assert!(is_backup_file("sources.2025-12-14-001.json", "sources", "json"));
        assert!(is_backup_file("risk-summary.2025-12-14-001.csv", "risk-summary", "csv"));
        assert!(!is_backup_file("sources.2025-12-14-001.json", "risk-summary", "json"));
        assert!(!is_backup_file("sources.2025-12-14-001.csv", "sources", "json"));
        assert!(!is_backup_file("sources.extra.2025-12-14-001.json", "sources", "json"));
    }

    #[test]
    fn test_file_prefix() {
        assert_eq!(file_prefix("Risk Summary"), "risk-summary");
        assert_eq!(file_prefix("High Value / Log"), "high-value-log");
        assert_eq!(file_prefix("  "), "worksheet");
    }

    #[tokio::test]
    async fn test_save_json_sequence_and_rotation() {
        let dir = TempDir::new().unwrap();
        let b = backup(&dir, 2);
        let first = b.save_json(SOURCES, &vec!["a"]).await.unwrap();
        let second = b.save_json(SOURCES, &vec!["b"]).await.unwrap();
        let third = b.save_json(SOURCES, &vec!["c"]).await.unwrap();

        let date = today();
        assert!(first.ends_with(format!("sources.{date}-001.json")));
        assert!(third.ends_with(format!("sources.{date}-003.json")));
        assert!(!first.exists());
        assert!(second.is_file());
        assert!(third.is_file());
        let content = utils::read(&third).await.unwrap();
        assert!(content.contains("\"c\""));
    }

    #[tokio::test]
    async fn test_save_csv() {
        let dir = TempDir::new().unwrap();
        let b = backup(&dir, 5);
        let rows = vec![
            vec!["Station Code".to_string(), "Total".to_string()],
            vec!["A1".to_string(), "₹1,300.00".to_string()],
        ];
        let path = b.save_csv("Risk Summary", &rows).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("risk-summary."));
        assert!(name.ends_with("-001.csv"));
        let content = utils::read(&path).await.unwrap();
        assert_eq!(content, "Station Code,Total\nA1,\"₹1,300.00\"\n");
    }
}
