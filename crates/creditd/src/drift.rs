use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat};
use credit_drift::{DriftEngine, DriftErrorKind, DriftRun};
use credit_store::{DriftReportRecord, DriftReportStore};

use crate::cli::{DriftArgs, ReportsArgs};
use crate::workspace::CreditWorkspace;

pub const EXIT_OK: i32 = 0;
pub const EXIT_COMPUTATION_FAILED: i32 = 1;
pub const EXIT_STORE_UNAVAILABLE: i32 = 2;

pub fn exit_code_for(kind: DriftErrorKind) -> i32 {
    match kind {
        DriftErrorKind::DataUnavailable => EXIT_STORE_UNAVAILABLE,
        DriftErrorKind::Computation => EXIT_COMPUTATION_FAILED,
    }
}

/// Batch trigger. Every failure, including an unloadable workspace, lands on
/// `out` with an exit code; the store cannot be located without a workspace,
/// so load failures count as store unavailable.
pub fn run_drift_command(root: &Path, args: &DriftArgs, out: &mut dyn Write) -> Result<i32> {
    let workspace = match CreditWorkspace::load(root) {
        Ok(workspace) => workspace,
        Err(err) => return report_workspace_failure(&err, out),
    };
    run_drift_in(&workspace, args, out)
}

fn run_drift_in(
    workspace: &CreditWorkspace,
    args: &DriftArgs,
    out: &mut dyn Write,
) -> Result<i32> {
    let store = match workspace.open_store() {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "prediction store unavailable");
            writeln!(out, "drift computation failed: prediction store unavailable: {err}")?;
            return Ok(EXIT_STORE_UNAVAILABLE);
        }
    };

    run_drift_once(&workspace.drift_engine(store), args.json, out)
}

fn report_workspace_failure(err: &anyhow::Error, out: &mut dyn Write) -> Result<i32> {
    tracing::error!(error = %err, "workspace unavailable");
    writeln!(out, "drift computation failed: workspace unavailable: {err:#}")?;
    Ok(EXIT_STORE_UNAVAILABLE)
}

/// One batch computation. Failures are reported on `out` and mapped to an
/// exit code; only write errors escape as `Err`.
pub fn run_drift_once(engine: &DriftEngine, json: bool, out: &mut dyn Write) -> Result<i32> {
    match engine.run() {
        Ok(run) => {
            if json {
                serde_json::to_writer_pretty(&mut *out, &run)
                    .context("failed to serialize drift report")?;
                writeln!(out)?;
            } else {
                write_run_summary(&run, out)?;
            }
            Ok(EXIT_OK)
        }
        Err(err) => {
            tracing::error!(
                kind = err.kind().as_str(),
                operation = err.operation(),
                error = %err,
                "drift computation failed"
            );
            writeln!(out, "drift computation failed ({}): {err}", err.kind().as_str())?;
            Ok(exit_code_for(err.kind()))
        }
    }
}

pub fn run_reports_command(
    workspace: &CreditWorkspace,
    args: &ReportsArgs,
    out: &mut dyn Write,
) -> Result<i32> {
    let reports = match workspace
        .open_store()
        .and_then(|store| store.list_drift_reports(args.limit))
    {
        Ok(reports) => reports,
        Err(err) => {
            tracing::error!(error = %err, "failed to read drift reports");
            writeln!(out, "failed to read drift reports: {err}")?;
            return Ok(EXIT_STORE_UNAVAILABLE);
        }
    };

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &reports)
            .context("failed to serialize drift reports")?;
        writeln!(out)?;
        return Ok(EXIT_OK);
    }

    if reports.is_empty() {
        writeln!(out, "no drift reports recorded")?;
        return Ok(EXIT_OK);
    }
    for report in &reports {
        write_record_line(report, out)?;
    }
    Ok(EXIT_OK)
}

fn write_run_summary(run: &DriftRun, out: &mut dyn Write) -> Result<()> {
    let report = &run.report;
    match run.report_id {
        Some(id) => writeln!(out, "drift report #{id} at {}", format_millis(report.created_at))?,
        None => writeln!(
            out,
            "drift report (not persisted) at {}",
            format_millis(report.created_at)
        )?,
    }
    writeln!(out, "  subject: {}", report.subject)?;
    writeln!(out, "  status: {}", report.status)?;
    if let Some(psi) = report.psi {
        writeln!(out, "  psi: {psi:.6}")?;
    }
    if let (Some(statistic), Some(p_value)) = (report.ks_statistic, report.ks_p_value) {
        writeln!(out, "  ks: statistic={statistic:.4} p_value={p_value:.4e}")?;
    }
    writeln!(
        out,
        "  samples: {} ({} of {} records discarded)",
        report.sample_count, report.discarded_records, report.total_records
    )?;
    for warning in &run.warnings {
        writeln!(out, "  warning: {warning}")?;
    }
    Ok(())
}

fn write_record_line(report: &DriftReportRecord, out: &mut dyn Write) -> Result<()> {
    let psi = report
        .psi
        .map(|psi| format!("{psi:.6}"))
        .unwrap_or_else(|| "-".to_owned());
    let samples = report
        .sample_count
        .map(|count| count.to_string())
        .unwrap_or_else(|| "-".to_owned());
    writeln!(
        out,
        "#{} {} {} {} psi={} samples={}",
        report.id,
        format_millis(report.created_at),
        report.subject,
        report.status,
        psi,
        samples
    )?;
    Ok(())
}

fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|timestamp| timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| millis.to_string())
}
