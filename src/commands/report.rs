use crate::api::{self, Mode, Notification, Notifier, Outbox};
use crate::commands::sources::{
    append_log, read_optional, read_required, snapshot, write_or_fallback, Tagged,
};
use crate::commands::Out;
use crate::model::{Amount, Diagnostic, Diagnostics};
use crate::report::{
    aggregate, build_summary, extract, high_value, html, merge, summary, AggregateRow,
    HighValueRecord,
};
use crate::{Config, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// The structured result of `cod-risk report`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    /// Station rows in summary order, followed by the total row.
    summary: Vec<AggregateRow>,
    high_value: Vec<HighValueRecord>,
    diagnostics: Vec<Diagnostic>,
    /// CSV files written in place of worksheets that could not be written.
    fallbacks: Vec<PathBuf>,
    /// Rows appended to the high-value log.
    logged: usize,
    notifications: usize,
}

impl ReportOutput {
    pub fn summary(&self) -> &[AggregateRow] {
        &self.summary
    }

    pub fn high_value(&self) -> &[HighValueRecord] {
        &self.high_value
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn fallbacks(&self) -> &[PathBuf] {
        &self.fallbacks
    }

    pub fn logged(&self) -> usize {
        self.logged
    }

    pub fn notifications(&self) -> usize {
        self.notifications
    }
}

/// Runs the whole pipeline: read the risk worksheets, build the per-station summary and the
/// high-value list, write both to the report workbook, append new keys to the high-value log and
/// send the summary email.
///
/// With `dry_run`, nothing is written and nothing is sent.
pub async fn report(config: Config, mode: Mode, dry_run: bool) -> Result<Out<ReportOutput>> {
    let roster = config.roster()?;
    let mut diagnostics = Diagnostics::default();

    let mut source = api::sheet(&config.source_workbook(), mode);
    let risk_tables = read_required(source.as_mut(), config.risk_worksheets()).await?;
    let extra_tables = read_optional(
        source.as_mut(),
        config.high_value().extra_worksheets(),
        &mut diagnostics,
    )
    .await;

    let all_tables: Vec<Tagged> = risk_tables.iter().chain(&extra_tables).cloned().collect();
    snapshot(&config.backup(), &all_tables).await?;

    let rules = config.columns();
    let summary_rows = {
        let merged = merge(risk_tables, &rules, &[]).into_value();
        let (rows, found) = aggregate(
            &merged,
            &roster,
            config.categories(),
            config.hub_exclusions(),
        )
        .into_parts();
        diagnostics.extend(found);
        build_summary(rows, config.sort())
    };

    let hv = config.high_value();
    let merged = merge(all_tables, &rules, &[]).into_value();
    let (records, found) =
        extract(&merged, hv.threshold(), hv.key_role(), hv.value_role()).into_parts();
    diagnostics.extend(found);
    let (_, diagnostics) = diagnostics.finish(()).into_parts();

    let mut output = ReportOutput {
        summary: summary_rows,
        high_value: records,
        diagnostics,
        fallbacks: Vec::new(),
        logged: 0,
        notifications: 0,
    };

    if dry_run {
        info!("Dry run, nothing was written or sent");
    } else {
        publish(&config, mode, &mut output).await?;
        output.notifications = notify(&config, &output).await;
    }

    let message = message(&output, dry_run);
    Ok(Out::new(message, output))
}

/// Writes the summary and high-value worksheets and appends to the high-value log.
async fn publish(config: &Config, mode: Mode, output: &mut ReportOutput) -> Result<()> {
    let backup = config.backup();
    let mut sheet = api::sheet(&config.report_workbook(), mode);

    let summary_rows = summary::to_sheet_rows(&output.summary, config.sheet_amounts());
    let hv_rows = high_value::to_sheet_rows(&output.high_value, config.sheet_amounts());
    for (worksheet, rows) in [
        (config.summary_worksheet(), &summary_rows),
        (config.high_value().worksheet(), &hv_rows),
    ] {
        if let Some(path) = write_or_fallback(sheet.as_mut(), &backup, worksheet, rows).await? {
            output.fallbacks.push(path);
        }
    }

    if let Some(log) = config.high_value().log_worksheet() {
        match append_log(sheet.as_mut(), log, &output.high_value).await {
            Ok(n) => output.logged = n,
            Err(e) => error!("Unable to append to '{log}': {e:#}"),
        }
    }
    Ok(())
}

/// Sends the summary to the configured recipients and, when enabled, each station's row to that
/// station. Failures are logged and not retried. Returns the number of messages sent.
async fn notify(config: &Config, output: &ReportOutput) -> usize {
    let notify = config.notify();
    let mut outbox = Outbox::new(config.outbox());
    let mut sent = 0;

    if notify.to().is_empty() {
        warn!("No notification recipients are configured");
    } else {
        let body = html::render(notify.subject(), &output.summary, &output.high_value);
        let message = Notification::new(notify.to().to_vec(), notify.subject(), body)
            .with_cc(notify.cc().to_vec());
        sent += send(&mut outbox, &message).await;
    }

    if notify.per_station() {
        for row in &output.summary {
            let Some(station) = row.station() else {
                continue;
            };
            if station.emails().is_empty() {
                continue;
            }
            let subject = format!("{} - {}", notify.subject(), station.code());
            let body = html::render_station(&subject, row);
            let message = Notification::new(station.emails().to_vec(), subject, body);
            sent += send(&mut outbox, &message).await;
        }
    }
    sent
}

async fn send(notifier: &mut (dyn Notifier + Send), message: &Notification) -> usize {
    match notifier.send(message).await {
        Ok(()) => 1,
        Err(e) => {
            error!("Unable to send '{}': {e:#}", message.subject());
            0
        }
    }
}

fn message(output: &ReportOutput, dry_run: bool) -> String {
    let stations = output.summary.iter().filter(|r| !r.is_total()).count();
    let total = output
        .summary
        .last()
        .map(AggregateRow::total)
        .unwrap_or(Decimal::ZERO);
    let mut message = format!(
        "{} risk summary for {stations} stations, total {}, with {} high-value shipments",
        if dry_run { "Computed" } else { "Published" },
        Amount::new(total),
        output.high_value.len()
    );
    if !output.diagnostics.is_empty() {
        message.push_str(&format!(" ({} warnings)", output.diagnostics.len()));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Sheet, OUTSTANDING_CASH, PENDING_RTS, SHORT_CASH};
    use crate::model::Role;
    use crate::report::TOTAL_LABEL;
    use crate::test::TestEnv;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn codes(rows: &[AggregateRow]) -> Vec<&str> {
        rows.iter()
            .map(|r| r.station().map(|s| s.code()).unwrap_or(TOTAL_LABEL))
            .collect()
    }

    #[tokio::test]
    async fn test_report_seed_data() {
        let env = TestEnv::new().await;
        let out = report(env.config(), Mode::Test, false).await.unwrap();
        let output = out.structure().unwrap();

        assert_eq!(
            codes(output.summary()),
            vec!["DEL03", "BLR01", "HYD04", "PNQ02", "TOTAL"]
        );
        let blr = &output.summary()[1];
        assert_eq!(blr.amount("short_cash"), dec("1550"));
        assert_eq!(blr.amount("outstanding_cash"), dec("4500.50"));
        assert_eq!(blr.amount("pending_returns"), dec("7500"));
        assert_eq!(blr.total(), dec("13550.50"));

        // eDSP short cash is excluded
        let pnq = &output.summary()[3];
        assert_eq!(pnq.amount("short_cash"), Decimal::ZERO);
        assert_eq!(pnq.total(), dec("2000"));

        let total = output.summary().last().unwrap();
        assert_eq!(total.total(), dec("29550.50"));

        let keys: Vec<&str> = output.high_value().iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["TRK1003", "TRK1001"]);
        assert_eq!(output.high_value()[1].value(), dec("4500"));

        assert!(output.diagnostics().contains(&Diagnostic::AmountCoercedToZero {
            source: OUTSTANDING_CASH.to_string(),
            row: 3,
            value: "n/a".to_string(),
        }));
        assert!(output.diagnostics().contains(&Diagnostic::UnresolvedColumn {
            source: SHORT_CASH.to_string(),
            role: Role::TrackingId,
        }));
        assert!(output.fallbacks().is_empty());
        assert_eq!(output.logged(), 2);
    }

    #[tokio::test]
    async fn test_report_writes_worksheets() {
        let env = TestEnv::new().await;
        report(env.config(), Mode::Test, false).await.unwrap();

        let state = env.get_state();
        let summary = &state["Risk Summary"];
        assert_eq!(summary[0][0], "Station Code");
        assert_eq!(summary.len(), 6);
        assert_eq!(summary[5][0], "TOTAL");
        assert_eq!(summary[5].last().unwrap(), "29550.50");

        let hv = &state["High Value Shipments"];
        assert_eq!(hv.len(), 3);
        assert_eq!(hv[1][0], "TRK1003");
        assert_eq!(hv[1][1], "12000.00");

        let log = &state["High Value Log"];
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_report_currency_sheet_amounts() {
        let env = TestEnv::with_sheet_amounts("currency").await;
        report(env.config(), Mode::Test, false).await.unwrap();
        let state = env.get_state();
        assert_eq!(state["Risk Summary"][5].last().unwrap(), "₹29,550.50");
        assert_eq!(state["High Value Shipments"][1][1], "₹12,000.00");
        // the log stays machine-readable
        assert_eq!(state["High Value Log"][1][2], "12000.00");
    }

    #[tokio::test]
    async fn test_report_log_is_append_only() {
        let env = TestEnv::new().await;
        report(env.config(), Mode::Test, false).await.unwrap();
        let second = report(env.config(), Mode::Test, false).await.unwrap();
        assert_eq!(second.structure().unwrap().logged(), 0);
        assert_eq!(env.get_state()["High Value Log"].len(), 3);
    }

    #[tokio::test]
    async fn test_report_sends_notifications() {
        let env = TestEnv::with_recipients(&["ops@example.com"], true).await;
        let out = report(env.config(), Mode::Test, false).await.unwrap();
        // one summary plus one for the only station with emails
        assert_eq!(out.structure().unwrap().notifications(), 2);
        let files = std::fs::read_dir(env.config().outbox()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let env = TestEnv::with_recipients(&["ops@example.com"], false).await;
        let out = report(env.config(), Mode::Test, true).await.unwrap();
        assert!(out.message().starts_with("Computed"));
        assert!(!env.get_state().contains_key("Risk Summary"));
        assert_eq!(std::fs::read_dir(env.config().outbox()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stray_trailing_cell_is_ignored() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.get_mut(SHORT_CASH).unwrap()[1].push("see note".to_string());
        env.set_state(state);

        let out = report(env.config(), Mode::Test, true).await.unwrap();
        let blr = &out.structure().unwrap().summary()[1];
        assert_eq!(blr.station().unwrap().code(), "BLR01");
        assert_eq!(blr.amount("short_cash"), dec("1550"));
    }

    #[tokio::test]
    async fn test_missing_risk_worksheet_is_fatal() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.remove(PENDING_RTS);
        env.set_state(state);
        let result = report(env.config(), Mode::Test, false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_extra_worksheet_is_a_diagnostic() {
        let env = TestEnv::with_extra_worksheets(&["Lost Shipments"]).await;
        let out = report(env.config(), Mode::Test, true).await.unwrap();
        assert!(out
            .structure()
            .unwrap()
            .diagnostics()
            .iter()
            .any(|d| matches!(
                d,
                Diagnostic::SourceUnavailable { source, .. } if source == "Lost Shipments"
            )));
    }

    #[tokio::test]
    async fn test_extra_worksheet_feeds_high_value_only() {
        let env = TestEnv::with_extra_worksheets(&["Lost Shipments"]).await;
        let mut sheet = env.source_sheet();
        sheet
            .put(
                "Lost Shipments",
                &[
                    vec!["Tracking ID".into(), "Station".into(), "Value".into()],
                    vec!["TRK9".into(), "BLR01".into(), "99000".into()],
                ],
            )
            .await
            .unwrap();
        let out = report(env.config(), Mode::Test, true).await.unwrap();
        let output = out.structure().unwrap();
        assert_eq!(output.high_value()[0].key(), "TRK9");
        assert_eq!(output.summary()[1].total(), dec("13550.50"));
    }
}
