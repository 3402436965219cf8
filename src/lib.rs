//! cod-risk reconciles per-station cash and return-to-shipper worksheets into a risk summary.
//!
//! The pipeline lives in [`report`] as plain functions over in-memory [`model::Table`]s. The
//! [`commands`] read and write the workbooks around it.

mod api;
pub mod args;
mod backup;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod report;
mod utils;


pub use api::{CsvWorkbook, Mode, Notification, Notifier, Outbox, Sheet, TestSheet};
pub use config::{Config, HighValueConfig, NotifyConfig, SheetAmounts};
pub use error::Error;
pub use error::Result;
