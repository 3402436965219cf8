//! Configuration file handling for cod-risk.
//!
//! The configuration file is stored at `$COD_RISK_HOME/config.json` and names the workbooks and
//! worksheets to read, the category and exclusion rules, the sort order, the high-value settings,
//! the notification recipients and backup settings.

use crate::api::{OUTSTANDING_CASH, PENDING_RTS, SHORT_CASH};
use crate::backup::Backup;
use crate::model::{Amount, AmountFormat, Role, Roster};
use crate::report::{CategoryRule, CategoryRules, ColumnRules, HubExclusion, SortOrder};
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_NAME: &str = "cod-risk";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const BACKUPS: &str = ".backups";
const OUTBOX: &str = "outbox";
const CONFIG_JSON: &str = "config.json";
const ROSTER_CSV: &str = "roster.csv";
const WORKBOOK: &str = "workbook";
const SUMMARY_WORKSHEET: &str = "Risk Summary";
const HIGH_VALUE_WORKSHEET: &str = "High Value Shipments";
const HIGH_VALUE_LOG_WORKSHEET: &str = "High Value Log";
const HIGH_VALUE_THRESHOLD: i64 = 2500;
const SUBJECT: &str = "COD/RTS Risk Summary";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$COD_RISK_HOME` and from there it loads `$COD_RISK_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    outbox: PathBuf,
    config_path: PathBuf,
    roster_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its subdirectories and:
    /// - Copies `roster_file` to `roster.csv` in the home directory, after checking that it parses
    /// - Creates an initial `config.json` file with default settings
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g. `$HOME/cod-risk`
    /// - `roster_file` - The station roster CSV.
    /// - `source_workbook` - Where the risk worksheets are read from. Defaults to `workbook` in the
    ///   home directory.
    /// - `report_workbook` - Where the summary is written. Defaults to `source_workbook`.
    ///
    /// # Errors
    /// - Returns an error if the roster is invalid or if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        roster_file: &Path,
        source_workbook: Option<&Path>,
        report_workbook: Option<&Path>,
    ) -> Result<Self> {
        // Fail before touching the filesystem if the roster is unusable
        let roster = Roster::load(roster_file)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the cod-risk home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;
        let outbox = root.join(OUTBOX);
        utils::make_dir(&outbox).await?;

        let roster_path = root.join(ROSTER_CSV);
        utils::copy(roster_file, &roster_path).await?;

        let source_workbook = source_workbook
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(WORKBOOK));
        let report_workbook = report_workbook
            .map(Path::to_path_buf)
            .unwrap_or_else(|| source_workbook.clone());

        let config_file = ConfigFile {
            source_workbook,
            report_workbook,
            ..ConfigFile::default()
        };
        let config_path = root.join(CONFIG_JSON);
        config_file.save(&config_path).await?;

        let config = Self {
            root,
            backups,
            outbox,
            config_path,
            roster_path,
            config_file,
        };
        utils::make_dir(config.source_workbook()).await?;
        debug!(
            "Created {} with {} stations",
            config.root.display(),
            roster.len()
        );
        Ok(config)
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the backups directory and the roster exist
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The cod-risk home directory is missing, run 'cod-risk init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            backups: root.join(BACKUPS),
            outbox: root.join(OUTBOX),
            config_path,
            roster_path: root.join(ROSTER_CSV),
            config_file,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        if !config.roster_path.is_file() {
            bail!(
                "The roster file is missing '{}'",
                config.roster_path.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    pub fn roster_path(&self) -> &Path {
        &self.roster_path
    }

    /// Loads the station roster. An empty roster or a duplicate station code is an error.
    pub fn roster(&self) -> Result<Roster> {
        Roster::load(&self.roster_path)
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// The source workbook, resolved against the home directory when relative.
    pub fn source_workbook(&self) -> PathBuf {
        self.resolve_path(&self.config_file.source_workbook)
    }

    /// The report workbook, resolved against the home directory when relative.
    pub fn report_workbook(&self) -> PathBuf {
        self.resolve_path(&self.config_file.report_workbook)
    }

    pub fn risk_worksheets(&self) -> &[String] {
        &self.config_file.risk_worksheets
    }

    pub fn categories(&self) -> &CategoryRules {
        &self.config_file.categories
    }

    pub fn hub_exclusions(&self) -> &[HubExclusion] {
        &self.config_file.hub_exclusions
    }

    pub fn sort(&self) -> &SortOrder {
        &self.config_file.sort
    }

    /// The column rules from the config file, or the built-in rules when none are configured.
    pub fn columns(&self) -> ColumnRules {
        self.config_file.columns.clone().unwrap_or_default()
    }

    pub fn summary_worksheet(&self) -> &str {
        &self.config_file.summary_worksheet
    }

    /// How money is written to the summary and high-value worksheets.
    pub fn sheet_amounts(&self) -> AmountFormat {
        self.config_file.sheet_amounts.format()
    }

    pub fn high_value(&self) -> &HighValueConfig {
        &self.config_file.high_value
    }

    pub fn notify(&self) -> &NotifyConfig {
        &self.config_file.notify
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_path(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            return p.to_path_buf();
        }
        self.root.join(p)
    }
}

/// How money cells are written to worksheets. The high-value log is always plain.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SheetAmounts {
    /// `12000.00`
    #[default]
    Plain,
    /// `₹12,000.00`
    Currency,
}

impl SheetAmounts {
    pub fn format(self) -> AmountFormat {
        match self {
            SheetAmounts::Plain => AmountFormat::PLAIN,
            SheetAmounts::Currency => AmountFormat::CURRENCY,
        }
    }
}

/// Settings for the high-value shipment list.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct HighValueConfig {
    /// Rows whose value is strictly greater than this are kept.
    threshold: Amount,
    key_role: Role,
    value_role: Role,
    /// Receives the high-value list, replacing its contents on each run.
    worksheet: String,
    /// A running log of keys already reported, appended to and never rewritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    log_worksheet: Option<String>,
    /// Further source worksheets read only for the high-value list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extra_worksheets: Vec<String>,
}

impl Default for HighValueConfig {
    fn default() -> Self {
        Self {
            threshold: Amount::new(Decimal::from(HIGH_VALUE_THRESHOLD)),
            key_role: Role::TrackingId,
            value_role: Role::Amount,
            worksheet: HIGH_VALUE_WORKSHEET.to_string(),
            log_worksheet: Some(HIGH_VALUE_LOG_WORKSHEET.to_string()),
            extra_worksheets: Vec::new(),
        }
    }
}

impl HighValueConfig {
    pub fn threshold(&self) -> Decimal {
        self.threshold.value()
    }

    pub fn key_role(&self) -> Role {
        self.key_role
    }

    pub fn value_role(&self) -> Role {
        self.value_role
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    pub fn log_worksheet(&self) -> Option<&str> {
        self.log_worksheet.as_deref()
    }

    pub fn extra_worksheets(&self) -> &[String] {
        &self.extra_worksheets
    }
}

/// Who receives the summary email.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct NotifyConfig {
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    /// Also send each station's own row to the addresses in its roster `Emails`.
    per_station: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            to: Vec::new(),
            cc: Vec::new(),
            subject: SUBJECT.to_string(),
            per_station: false,
        }
    }
}

impl NotifyConfig {
    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn per_station(&self) -> bool {
        self.per_station
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "cod-risk",
///   "config_version": 1,
///   "source_workbook": "workbook",
///   "report_workbook": "workbook",
///   "risk_worksheets": ["DSP Short Cash to be Submitted", "Outstanding Cash", "Pending RTS"],
///   "categories": [
///     {"pattern": "short cash", "category": "short_cash"},
///     {"pattern": "outstanding", "category": "outstanding_cash"},
///     {"pattern": "rts", "category": "pending_returns"}
///   ],
///   "hub_exclusions": [{"hub_type": "eDSP", "category": "short_cash"}],
///   "sort": {"primary": "region", "secondary": "hub_type", "secondary_rank": ["DSP", "eDSP"]},
///   "summary_worksheet": "Risk Summary",
///   "sheet_amounts": "plain",
///   "high_value": {"threshold": "2500", "key_role": "tracking_id", "value_role": "amount",
///                  "worksheet": "High Value Shipments"},
///   "notify": {"to": ["ops@example.com"], "cc": [], "subject": "COD/RTS Risk Summary",
///              "per_station": false},
///   "backup_copies": 5
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "cod-risk"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Directory of the workbook the risk worksheets are read from (relative to the home
    /// directory or absolute)
    source_workbook: PathBuf,

    /// Directory of the workbook the summary and high-value list are written to
    report_workbook: PathBuf,

    /// The risk worksheets to merge, in merge order. Each worksheet name is its provenance tag.
    risk_worksheets: Vec<String>,

    /// Maps provenance tags to summary categories
    categories: CategoryRules,

    #[serde(default)]
    hub_exclusions: Vec<HubExclusion>,

    #[serde(default)]
    sort: SortOrder,

    /// Overrides the built-in column rules when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    columns: Option<ColumnRules>,

    summary_worksheet: String,

    /// Whether worksheet money cells carry the currency symbol and separators
    #[serde(default)]
    sheet_amounts: SheetAmounts,

    #[serde(default)]
    high_value: HighValueConfig,

    #[serde(default)]
    notify: NotifyConfig,

    /// Number of backup copies to keep
    backup_copies: u32,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            source_workbook: PathBuf::from(WORKBOOK),
            report_workbook: PathBuf::from(WORKBOOK),
            risk_worksheets: vec![
                SHORT_CASH.to_string(),
                OUTSTANDING_CASH.to_string(),
                PENDING_RTS.to_string(),
            ],
            categories: CategoryRules::new(vec![
                CategoryRule::new("short cash", "short_cash"),
                CategoryRule::new("outstanding", "outstanding_cash"),
                CategoryRule::new("rts", "pending_returns"),
            ]),
            hub_exclusions: vec![HubExclusion::new("eDSP", "short_cash")],
            sort: SortOrder::default(),
            columns: None,
            summary_worksheet: SUMMARY_WORKSHEET.to_string(),
            sheet_amounts: SheetAmounts::Plain,
            high_value: HighValueConfig::default(),
            notify: NotifyConfig::default(),
            backup_copies: BACKUP_COPIES,
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it fails validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        ensure!(
            !self.risk_worksheets.is_empty(),
            "No risk worksheets are configured"
        );
        ensure!(
            !self.summary_worksheet.trim().is_empty(),
            "The summary worksheet name is empty"
        );
        ensure!(self.backup_copies > 0, "backup_copies must be at least 1");
        self.categories.validate(&self.hub_exclusions)?;
        if let Some(columns) = &self.columns {
            columns.validate()?;
        }
        Ok(())
    }
}
