//! `relayguard monitor`: the central sweep that keeps the shared status
//! file current for every device.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use relayguard_core::{
    CentralMonitor, DeviceOutcome, DeviceSource, JsonFileStore, Liveness, RateLimitedQueue,
    SweepReport, VendorClient,
};

use super::{Ctx, util};
use crate::cli::{MonitorArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: MonitorArgs, ctx: &Ctx) -> Result<(), CliError> {
    let store_path = args.store.unwrap_or_else(|| ctx.config.store_path());
    let store = Arc::new(JsonFileStore::new(&store_path));
    let api = util::vendor_client(ctx)?;

    let configured = ctx.config.devices();
    if configured.is_empty() {
        // Without configured devices the status file is also the device list.
        let source = Arc::new(JsonFileStore::new(&store_path));
        if source.list_devices().await?.is_empty() {
            return Err(CliError::NoDevices {
                path: ctx.config_path.display().to_string(),
            });
        }
        info!(path = %store_path.display(), "reading devices from the status file");
        run(ctx, build(ctx, api, store, source), args.once).await
    } else {
        run(ctx, build(ctx, api, store, Arc::new(configured)), args.once).await
    }
}

fn build<D: DeviceSource>(
    ctx: &Ctx,
    api: Arc<VendorClient>,
    store: Arc<JsonFileStore>,
    devices: Arc<D>,
) -> CentralMonitor<VendorClient, JsonFileStore, D> {
    let monitor = CentralMonitor::new(api, store, devices, ctx.config.monitor_config());
    if ctx.config.monitor.share_queue {
        monitor.with_shared_queue(RateLimitedQueue::new(ctx.config.queue_config()))
    } else {
        monitor
    }
}

async fn run<D: DeviceSource>(
    ctx: &Ctx,
    monitor: CentralMonitor<VendorClient, JsonFileStore, D>,
    once: bool,
) -> Result<(), CliError> {
    if once {
        let report = monitor.sweep().await?;
        let out = render_report(ctx, &report)?;
        output::print_output(&out, ctx.quiet);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let format = ctx.format;
    let color = ctx.color;
    let quiet = ctx.quiet;
    monitor
        .run(&cancel, |report| match summary_line(format, color, report) {
            Ok(line) => output::print_output(&line, quiet),
            Err(e) => warn!(error = %e, "could not render sweep report"),
        })
        .await;
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Published")]
    published: String,
}

fn to_row(outcome: &DeviceOutcome, color: bool) -> OutcomeRow {
    let liveness = liveness_of(outcome);
    OutcomeRow {
        device: outcome.device_id.clone(),
        state: output::paint_liveness(&liveness, color),
        reason: liveness.reason.unwrap_or_default(),
        attempts: outcome.attempts,
        published: if outcome.published { "yes" } else { "no" }.into(),
    }
}

fn liveness_of(outcome: &DeviceOutcome) -> Liveness {
    if outcome.status.is_online() {
        Liveness::online()
    } else {
        Liveness {
            online: false,
            reason: outcome.status.error(),
        }
    }
}

fn render_report(ctx: &Ctx, report: &SweepReport) -> Result<String, CliError> {
    match ctx.format {
        OutputFormat::Table => {
            let color = ctx.color;
            let mut out = output::render_list(
                OutputFormat::Table,
                &report.results,
                |o| to_row(o, color),
                |o| o.device_id.clone(),
            )?;
            if !report.abandoned.is_empty() {
                out.push_str("\nNot reached within the sweep budget: ");
                out.push_str(&report.abandoned.join(", "));
            }
            Ok(out)
        }
        OutputFormat::Plain => Ok(report
            .results
            .iter()
            .map(|o| outcome_line(o, ctx.color))
            .chain(report.abandoned.iter().map(|id| format!("{id} abandoned")))
            .collect::<Vec<_>>()
            .join("\n")),
        format => output::render_single(format, report, |_| String::new()),
    }
}

fn outcome_line(outcome: &DeviceOutcome, color: bool) -> String {
    let liveness = liveness_of(outcome);
    match liveness.reason {
        Some(ref reason) => format!(
            "{} {} ({reason})",
            outcome.device_id,
            output::paint_liveness(&liveness, color)
        ),
        None => format!(
            "{} {}",
            outcome.device_id,
            output::paint_liveness(&liveness, color)
        ),
    }
}

/// One line per sweep while running continuously.
#[derive(Serialize)]
struct SweepSummary<'a> {
    started_at: String,
    devices: usize,
    published: usize,
    failed: &'a [String],
    abandoned: &'a [String],
}

fn summary_line(format: OutputFormat, color: bool, report: &SweepReport) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(report)?),
        OutputFormat::Yaml => {
            let summary = SweepSummary {
                started_at: report.started_at.to_rfc3339(),
                devices: report.results.len() + report.abandoned.len(),
                published: report.published,
                failed: &report.failed,
                abandoned: &report.abandoned,
            };
            Ok(format!("---\n{}", serde_yaml::to_string(&summary)?))
        }
        OutputFormat::Table | OutputFormat::Plain => {
            let online = report.results.iter().filter(|o| o.status.is_online()).count();
            let mut line = format!(
                "{} sweep: {online}/{} online, {} published",
                output::dim(&report.started_at.format("%H:%M:%S").to_string(), color),
                report.results.len() + report.abandoned.len(),
                report.published,
            );
            if !report.failed.is_empty() {
                line.push_str(&format!(", failed: {}", report.failed.join(", ")));
            }
            if !report.abandoned.is_empty() {
                line.push_str(&format!(", abandoned: {}", report.abandoned.join(", ")));
            }
            Ok(line)
        }
    }
}
