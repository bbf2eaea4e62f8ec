//! `relayguard status`: one-shot status, probed live or read from the
//! shared status file.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use relayguard_core::{
    Device, DeviceApi, DeviceSource, JsonFileStore, Liveness, RateLimitedQueue, StatusRecord,
    StatusStore,
};

use super::{Ctx, util};
use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output;

/// Effective status of one device as shown to the operator.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub liveness: Liveness,
    pub ip: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}

impl StatusView {
    pub fn new(device: &Device, record: Option<&StatusRecord>, liveness: Liveness) -> Self {
        Self {
            id: device.id.clone(),
            name: device.display_name().to_owned(),
            liveness,
            ip: record.and_then(|r| r.ip().map(str::to_owned)),
            last_check: record.map(StatusRecord::observed_at),
        }
    }

    /// Single-line rendering used by `plain` and by `watch`.
    pub fn line(&self, color: bool) -> String {
        let mut line = format!(
            "{} {}",
            self.id,
            output::paint_liveness(&self.liveness, color)
        );
        if let Some(ref reason) = self.liveness.reason {
            line.push_str(&format!(" ({reason})"));
        }
        if let Some(ref ip) = self.ip {
            line.push(' ');
            line.push_str(&output::dim(ip, color));
        }
        line
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Last check")]
    last_check: String,
}

fn to_row(v: &StatusView, color: bool) -> StatusRow {
    StatusRow {
        id: v.id.clone(),
        name: v.name.clone(),
        state: output::paint_liveness(&v.liveness, color),
        reason: v.liveness.reason.clone().unwrap_or_default(),
        ip: v.ip.clone().unwrap_or_default(),
        last_check: v
            .last_check
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    }
}

pub async fn handle(args: StatusArgs, ctx: &Ctx) -> Result<(), CliError> {
    let wanted: Vec<String> = args.device.into_iter().collect();

    let views = match args.store {
        Some(path) => {
            let path = path.unwrap_or_else(|| ctx.config.store_path());
            from_store(ctx, path, &wanted).await?
        }
        None => {
            let devices = util::select_devices(util::configured_devices(ctx)?, &wanted)?;
            probe_all(ctx, devices).await?
        }
    };

    let color = ctx.color;
    let out = output::render_list(ctx.format, &views, |v| to_row(v, color), |v| v.line(color))?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}

/// Probe every device once through a fresh queue, so the calls stay spaced
/// even for a one-shot command. Probes are enqueued one at a time so a
/// bounded queue never rejects them; a device whose probe could not run is
/// shown offline with the reason.
async fn probe_all(ctx: &Ctx, devices: Vec<Device>) -> Result<Vec<StatusView>, CliError> {
    let api = util::vendor_client(ctx)?;
    let queue = RateLimitedQueue::new(ctx.config.queue_config());
    let evaluator = ctx.config.staleness();

    let mut views = Vec::with_capacity(devices.len());
    for device in devices {
        let device = Arc::new(device);
        let probe_device = Arc::clone(&device);
        let api = Arc::clone(&api);
        let outcome = queue
            .enqueue(move || async move { api.query_status(&probe_device).await })
            .await;

        let view = match outcome {
            Ok(record) => {
                let liveness = evaluator.evaluate(Some(&record), Utc::now());
                StatusView::new(&device, Some(&record), liveness)
            }
            Err(err) => {
                warn!(device = %device.id, error = %err, "status check did not run");
                StatusView::new(&device, None, Liveness::offline(err.to_string()))
            }
        };
        views.push(view);
    }
    queue.shutdown();
    Ok(views)
}

/// Read what the central monitor last published and apply the staleness
/// rule. Devices come from the config, or from the file itself when the
/// config lists none.
async fn from_store(
    ctx: &Ctx,
    path: PathBuf,
    wanted: &[String],
) -> Result<Vec<StatusView>, CliError> {
    let store = JsonFileStore::new(path);
    let pool = {
        let configured = ctx.config.devices();
        if configured.is_empty() {
            store.list_devices().await?
        } else {
            configured
        }
    };
    let devices = util::select_devices(pool, wanted)?;

    let records: BTreeMap<String, StatusRecord> = store.load_all().await?;
    let evaluator = ctx.config.staleness();
    let now = Utc::now();

    Ok(devices
        .iter()
        .map(|device| {
            let record = records.get(&device.id);
            StatusView::new(device, record, evaluator.evaluate(record, now))
        })
        .collect())
}
