//! These structs provide the CLI interface for the cod-risk CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// cod-risk: reconciles station cash and return-to-shipper worksheets into a risk summary.
///
/// The worksheets are exported by other tooling into a workbook directory, one CSV file per
/// worksheet. cod-risk reads them, sums short cash, outstanding cash and pending returns for every
/// station in the roster, lists the high-value shipments, writes both back to the report workbook
/// and drops an HTML summary email into the outbox.
///
/// Set COD_RISK_IN_TEST_MODE to run against built-in sample worksheets instead of CSV files.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need a station roster CSV file with the
    /// columns Station Code, City, Region, Hub Type, Managers and Emails. Managers and Emails are
    /// lists separated by `;`. The roster is copied into the home directory.
    ///
    /// Afterwards, edit config.json in the home directory to add notification recipients or to
    /// change the worksheets that are read.
    Init(InitArgs),
    /// Build the risk summary and the high-value list, write them and send the summary email.
    Report(ReportArgs),
    /// Show which column of each source worksheet every role resolves to.
    Resolve,
    /// Build and write only the high-value shipment list.
    HighValue(HighValueArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where cod-risk data and configuration is held. Defaults to ~/cod-risk
    #[arg(long, env = "COD_RISK_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `cod-risk init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The station roster CSV file.
    #[arg(long)]
    roster: PathBuf,

    /// The directory holding the risk worksheets as CSV files. Relative paths are relative to the
    /// home directory. Defaults to `workbook`.
    #[arg(long)]
    source_workbook: Option<PathBuf>,

    /// The directory the summary worksheets are written to. Defaults to the source workbook.
    #[arg(long)]
    report_workbook: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(roster: impl Into<PathBuf>) -> Self {
        Self {
            roster: roster.into(),
            source_workbook: None,
            report_workbook: None,
        }
    }

    pub fn roster(&self) -> &Path {
        &self.roster
    }

    pub fn source_workbook(&self) -> Option<&Path> {
        self.source_workbook.as_deref()
    }

    pub fn report_workbook(&self) -> Option<&Path> {
        self.report_workbook.as_deref()
    }
}

/// (Not shown): Args for the `cod-risk report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Compute and print everything, but write nothing and send nothing. The source snapshot is
    /// still saved.
    #[arg(long)]
    dry_run: bool,
}

impl ReportArgs {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// (Not shown): Args for the `cod-risk high-value` command.
#[derive(Debug, Parser, Clone)]
pub struct HighValueArgs {
    /// Compute and print the list without writing it.
    #[arg(long)]
    dry_run: bool,
}

impl HighValueArgs {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("cod-risk"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or COD_RISK_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("cod-risk")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
