use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;
use tracing::info;

/// Creates the home directory, copies the station roster into it and writes a default
/// `config.json`.
pub async fn init(
    home: &Path,
    roster: &Path,
    source_workbook: Option<&Path>,
    report_workbook: Option<&Path>,
) -> Result<Out<()>> {
    let config = Config::create(home, roster, source_workbook, report_workbook).await?;
    info!(
        "Reading risk worksheets from {}",
        config.source_workbook().display()
    );
    info!(
        "Writing the summary to {}",
        config.report_workbook().display()
    );
    Ok(Out::new_message(format!(
        "Initialized cod-risk in {}, edit {} to add notification recipients",
        config.root().display(),
        config.config_path().display()
    )))
}
