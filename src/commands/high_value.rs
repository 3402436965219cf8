use crate::api::{self, Mode};
use crate::commands::sources::{append_log, read_optional, read_required, write_or_fallback};
use crate::commands::Out;
use crate::model::{Amount, AmountFormat, Diagnostic, Diagnostics};
use crate::report::{extract, high_value, merge, HighValueRecord};
use crate::{Config, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;

/// The structured result of `cod-risk high-value`.
#[derive(Debug, Clone, Serialize)]
pub struct HighValueOutput {
    records: Vec<HighValueRecord>,
    diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<PathBuf>,
    logged: usize,
}

impl HighValueOutput {
    pub fn records(&self) -> &[HighValueRecord] {
        &self.records
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn fallback(&self) -> Option<&PathBuf> {
        self.fallback.as_ref()
    }

    pub fn logged(&self) -> usize {
        self.logged
    }
}

/// Builds only the high-value list from the risk worksheets and any extra worksheets, writes it
/// to its worksheet and appends new keys to the log. With `dry_run` nothing is written.
pub async fn high_value(config: Config, mode: Mode, dry_run: bool) -> Result<Out<HighValueOutput>> {
    let hv = config.high_value();
    let mut diagnostics = Diagnostics::default();

    let mut source = api::sheet(&config.source_workbook(), mode);
    let mut tables = read_required(source.as_mut(), config.risk_worksheets()).await?;
    tables.extend(read_optional(source.as_mut(), hv.extra_worksheets(), &mut diagnostics).await);

    let merged = merge(tables, &config.columns(), &[]).into_value();
    let (records, found) =
        extract(&merged, hv.threshold(), hv.key_role(), hv.value_role()).into_parts();
    diagnostics.extend(found);
    let (_, diagnostics) = diagnostics.finish(()).into_parts();

    let mut output = HighValueOutput {
        records,
        diagnostics,
        fallback: None,
        logged: 0,
    };

    if !dry_run {
        let mut sheet = api::sheet(&config.report_workbook(), mode);
        let rows = high_value::to_sheet_rows(&output.records, config.sheet_amounts());
        output.fallback =
            write_or_fallback(sheet.as_mut(), &config.backup(), hv.worksheet(), &rows).await?;
        if let Some(log) = hv.log_worksheet() {
            match append_log(sheet.as_mut(), log, &output.records).await {
                Ok(n) => output.logged = n,
                Err(e) => error!("Unable to append to '{log}': {e:#}"),
            }
        }
    }

    let message = format!(
        "Found {} shipments above {}",
        output.records.len(),
        Amount::new_with_format(hv.threshold(), AmountFormat::PLAIN)
    );
    Ok(Out::new(message, output))
}
